//! Declarative form definitions and their compiled schema

use super::field::{FieldKind, FieldSpec, FieldValue};
use super::form_state::FormState;
use super::validation::{RuleSpec, Validator};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Problems found while compiling a form definition
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("form '{0}' declares no steps")]
    NoSteps(String),
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("step {step} governs undeclared field '{field}'")]
    UnknownField { step: usize, field: String },
    #[error("rule on '{field}' refers to undeclared field '{other}'")]
    UnknownReference { field: String, other: String },
    #[error("companion field '{field}' must point at a list field, '{other}' is not one")]
    InvalidCompanion { field: String, other: String },
    #[error("invalid pattern on '{field}'")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Rules attached to one governed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRules {
    pub field: String,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// One screen's worth of fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub title: String,
    pub fields: Vec<FieldRules>,
}

impl StepSpec {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    /// Govern `field` with the given rules
    pub fn field(mut self, field: &str, rules: Vec<RuleSpec>) -> Self {
        self.fields.push(FieldRules {
            field: field.to_string(),
            rules,
        });
        self
    }
}

/// Fields and steps of a multi-step form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub steps: Vec<StepSpec>,
}

impl FormDefinition {
    /// Load a definition from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read form definition {}", path.display()))?;
        let definition = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse form definition {}", path.display()))?;
        Ok(definition)
    }
}

/// A definition that passed compilation, with its validator
#[derive(Debug, Clone)]
pub struct FormSchema {
    definition: FormDefinition,
    validator: Validator,
}

impl FormSchema {
    pub fn compile(definition: FormDefinition) -> Result<Self, DefinitionError> {
        if definition.steps.is_empty() {
            return Err(DefinitionError::NoSteps(definition.name.clone()));
        }

        let mut seen = HashSet::new();
        for spec in &definition.fields {
            if !seen.insert(spec.name.as_str()) {
                return Err(DefinitionError::DuplicateField(spec.name.clone()));
            }
        }

        for spec in &definition.fields {
            if let Some(companion) = &spec.companion_of {
                let is_list = definition
                    .fields
                    .iter()
                    .any(|f| f.name == companion.field && f.kind() == FieldKind::List);
                if !is_list {
                    return Err(DefinitionError::InvalidCompanion {
                        field: spec.name.clone(),
                        other: companion.field.clone(),
                    });
                }
            }
        }

        let validator = Validator::compile(&definition)?;
        Ok(Self {
            definition,
            validator,
        })
    }

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn total_steps(&self) -> usize {
        self.definition.steps.len()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.definition.fields.iter().find(|f| f.name == name)
    }

    /// Title of a 1-based step
    pub fn step_title(&self, step: usize) -> Option<&str> {
        step.checked_sub(1)
            .and_then(|index| self.definition.steps.get(index))
            .map(|s| s.title.as_str())
    }

    /// Declarations of the fields a 1-based step governs
    pub fn step_fields(&self, step: usize) -> Vec<&FieldSpec> {
        let Some(step) = step
            .checked_sub(1)
            .and_then(|index| self.definition.steps.get(index))
        else {
            return Vec::new();
        };
        step.fields
            .iter()
            .filter_map(|rules| self.field(&rules.field))
            .collect()
    }

    pub fn defaults(&self) -> FormState {
        FormState::from_defaults(&self.definition.fields)
    }

    /// JSON body sent to the application API.
    ///
    /// UI-only fields are left out, as is companion text whose sentinel is
    /// not selected.
    pub fn payload(&self, state: &FormState) -> Value {
        let mut body = Map::new();
        for spec in &self.definition.fields {
            if spec.ui_only {
                continue;
            }
            if let Some(companion) = &spec.companion_of {
                let enabled = state
                    .get(&companion.field)
                    .and_then(FieldValue::as_list)
                    .is_some_and(|items| items.contains(&companion.sentinel));
                if !enabled {
                    continue;
                }
            }
            let value = state.get(&spec.name).unwrap_or(&spec.default);
            body.insert(spec.name.clone(), value.to_json());
        }
        Value::Object(body)
    }
}
