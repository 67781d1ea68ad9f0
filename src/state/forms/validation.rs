//! Tagged validation rules and the step-scoped validator
//!
//! Each step governs a set of fields. Validation is pure: it reads a
//! [`FormState`] and produces a [`ValidationResult`] listing, for every field
//! in scope, the messages of the rules that failed in declaration order.

use super::definition::{DefinitionError, FormDefinition};
use super::field::FieldValue;
use super::form_state::FormState;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Condition that ties a field to another field's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossCheck {
    /// Required when `field` holds `value`
    RequiredWhenEquals { field: String, value: String },
    /// Required when the list `field` contains `item`
    RequiredWhenContains { field: String, item: String },
    /// Must equal the value of `field`
    MatchesField { field: String },
}

impl CrossCheck {
    pub fn other_field(&self) -> &str {
        match self {
            Self::RequiredWhenEquals { field, .. }
            | Self::RequiredWhenContains { field, .. }
            | Self::MatchesField { field } => field,
        }
    }
}

/// A single validation rule.
///
/// Everything except `Required` and the "required when" cross-field checks
/// ignores blank values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    Required,
    MinLength {
        min: usize,
    },
    MaxLength {
        max: usize,
    },
    Pattern {
        pattern: String,
    },
    Range {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    OneOf {
        options: Vec<String>,
    },
    CrossField {
        check: CrossCheck,
    },
}

/// A rule with the message reported when it fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub rule: Rule,
    pub message: String,
}

impl RuleSpec {
    pub fn new(rule: Rule, message: &str) -> Self {
        Self {
            rule,
            message: message.to_string(),
        }
    }
}

/// Field name to error messages. An empty list means the field is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: IndexMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for a field, appending to any earlier messages
    pub fn insert(&mut self, field: &str, messages: Vec<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .extend(messages);
    }

    /// True when every field in scope passed
    pub fn is_valid(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }

    pub fn errors_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn first_error(&self, field: &str) -> Option<&str> {
        self.errors_for(field).first().map(String::as_str)
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Every field in scope with its messages
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// Fields with at least one message
    pub fn invalid_fields(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, messages)| !messages.is_empty())
            .map(|(field, _)| field)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Overwrite the entries of every field `fresh` covers
    pub fn replace_scope(&mut self, fresh: ValidationResult) {
        for (field, messages) in fresh.errors {
            self.errors.insert(field, messages);
        }
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}

#[derive(Debug, Clone)]
enum Check {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Range { min: Option<i64>, max: Option<i64> },
    OneOf(Vec<String>),
    CrossField(CrossCheck),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    check: Check,
    message: String,
}

impl CompiledRule {
    fn passes(&self, value: &FieldValue, state: &FormState) -> bool {
        match &self.check {
            Check::Required => !value.is_blank(),
            Check::CrossField(CrossCheck::RequiredWhenEquals { field, value: wanted }) => {
                let triggered = state
                    .get(field)
                    .and_then(FieldValue::as_str)
                    .is_some_and(|current| current == wanted.as_str());
                !triggered || !value.is_blank()
            }
            Check::CrossField(CrossCheck::RequiredWhenContains { field, item }) => {
                let triggered = state
                    .get(field)
                    .and_then(FieldValue::as_list)
                    .is_some_and(|items| items.contains(item));
                !triggered || !value.is_blank()
            }
            _ if value.is_blank() => true,
            Check::MinLength(min) => length(value).map_or(true, |len| len >= *min),
            Check::MaxLength(max) => length(value).map_or(true, |len| len <= *max),
            Check::Pattern(pattern) => value
                .as_str()
                .map_or(true, |text| pattern.is_match(text.trim())),
            Check::Range { min, max } => match value {
                FieldValue::Number(Some(n)) => {
                    min.map_or(true, |min| *n >= min) && max.map_or(true, |max| *n <= max)
                }
                _ => true,
            },
            Check::OneOf(options) => match value {
                FieldValue::List(items) => items.iter().all(|item| options.contains(item)),
                other => other.as_str().map_or(true, |s| options.iter().any(|o| o == s)),
            },
            Check::CrossField(CrossCheck::MatchesField { field }) => state
                .get(field)
                .is_some_and(|other| other.to_json() == value.to_json()),
        }
    }
}

/// Character count for text, item count for lists
fn length(value: &FieldValue) -> Option<usize> {
    match value {
        FieldValue::List(items) => Some(items.len()),
        other => other.as_str().map(|s| s.trim().chars().count()),
    }
}

#[derive(Debug, Clone)]
struct GovernedField {
    name: String,
    rules: Vec<CompiledRule>,
}

impl GovernedField {
    fn messages(&self, state: &FormState) -> Vec<String> {
        let blank = FieldValue::default();
        let value = state.get(&self.name).unwrap_or(&blank);
        self.rules
            .iter()
            .filter(|rule| !rule.passes(value, state))
            .map(|rule| rule.message.clone())
            .collect()
    }
}

/// Step-scoped validator compiled from a [`FormDefinition`]
#[derive(Debug, Clone)]
pub struct Validator {
    steps: Vec<Vec<GovernedField>>,
}

impl Validator {
    pub fn compile(definition: &FormDefinition) -> Result<Self, DefinitionError> {
        let declared = |name: &str| definition.fields.iter().any(|f| f.name == name);

        let mut steps = Vec::with_capacity(definition.steps.len());
        for (index, step) in definition.steps.iter().enumerate() {
            let mut governed = Vec::with_capacity(step.fields.len());
            for field_rules in &step.fields {
                if !declared(&field_rules.field) {
                    return Err(DefinitionError::UnknownField {
                        step: index + 1,
                        field: field_rules.field.clone(),
                    });
                }

                let mut rules = Vec::with_capacity(field_rules.rules.len());
                for spec in &field_rules.rules {
                    let check = match &spec.rule {
                        Rule::Required => Check::Required,
                        Rule::MinLength { min } => Check::MinLength(*min),
                        Rule::MaxLength { max } => Check::MaxLength(*max),
                        Rule::Pattern { pattern } => {
                            Check::Pattern(Regex::new(pattern).map_err(|source| {
                                DefinitionError::InvalidPattern {
                                    field: field_rules.field.clone(),
                                    source,
                                }
                            })?)
                        }
                        Rule::Range { min, max } => Check::Range {
                            min: *min,
                            max: *max,
                        },
                        Rule::OneOf { options } => Check::OneOf(options.clone()),
                        Rule::CrossField { check } => {
                            if !declared(check.other_field()) {
                                return Err(DefinitionError::UnknownReference {
                                    field: field_rules.field.clone(),
                                    other: check.other_field().to_string(),
                                });
                            }
                            Check::CrossField(check.clone())
                        }
                    };
                    rules.push(CompiledRule {
                        check,
                        message: spec.message.clone(),
                    });
                }

                governed.push(GovernedField {
                    name: field_rules.field.clone(),
                    rules,
                });
            }
            steps.push(governed);
        }

        Ok(Self { steps })
    }

    /// Validate only the fields governed by a 1-based step.
    ///
    /// Fields outside the step are absent from the result. An out-of-range
    /// step yields an empty result.
    pub fn validate_step(&self, step: usize, state: &FormState) -> ValidationResult {
        let mut result = ValidationResult::new();
        for field in self.step(step).unwrap_or_default() {
            result.insert(&field.name, field.messages(state));
        }
        result
    }

    /// Validate one field against the rules of every step governing it
    pub fn validate_field(&self, name: &str, state: &FormState) -> ValidationResult {
        let mut result = ValidationResult::new();
        for field in self.steps.iter().flatten().filter(|f| f.name == name) {
            result.insert(&field.name, field.messages(state));
        }
        result
    }

    /// Union of every step's result, used before submission
    pub fn validate_all(&self, state: &FormState) -> ValidationResult {
        let mut result = ValidationResult::new();
        for field in self.steps.iter().flatten() {
            result.insert(&field.name, field.messages(state));
        }
        result
    }

    /// First 1-based step with a failing field in `result`
    pub fn first_invalid_step(&self, result: &ValidationResult) -> Option<usize> {
        self.steps
            .iter()
            .position(|fields| {
                fields
                    .iter()
                    .any(|f| !result.errors_for(&f.name).is_empty())
            })
            .map(|index| index + 1)
    }

    fn step(&self, step: usize) -> Option<&[GovernedField]> {
        step.checked_sub(1)
            .and_then(|index| self.steps.get(index))
            .map(Vec::as_slice)
    }
}
