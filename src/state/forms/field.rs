//! Form field value objects

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// The kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Choice,
    List,
    Date,
    Flag,
    Number,
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Choice => "choice",
            Self::List => "list",
            Self::Date => "date",
            Self::Flag => "flag",
            Self::Number => "number",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Type-safe field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Choice(Option<String>),
    List(Vec<String>),
    Date(Option<NaiveDate>),
    Flag(bool),
    Number(Option<i64>),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Text(String::new())
    }
}

/// Input that could not be turned into a value of the requested kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueParseError {
    #[error("expected a date as YYYY-MM-DD, got '{0}'")]
    Date(String),
    #[error("expected yes or no, got '{0}'")]
    Flag(String),
    #[error("expected a whole number, got '{0}'")]
    Number(String),
}

impl FieldValue {
    /// Empty value of the given kind
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Text(String::new()),
            FieldKind::Choice => Self::Choice(None),
            FieldKind::List => Self::List(Vec::new()),
            FieldKind::Date => Self::Date(None),
            FieldKind::Flag => Self::Flag(false),
            FieldKind::Number => Self::Number(None),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Choice(_) => FieldKind::Choice,
            Self::List(_) => FieldKind::List,
            Self::Date(_) => FieldKind::Date,
            Self::Flag(_) => FieldKind::Flag,
            Self::Number(_) => FieldKind::Number,
        }
    }

    /// True when the value counts as "not answered"
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Choice(c) => c.as_deref().map_or(true, |c| c.trim().is_empty()),
            Self::List(items) => items.is_empty(),
            Self::Date(d) => d.is_none(),
            Self::Flag(b) => !b,
            Self::Number(n) => n.is_none(),
        }
    }

    /// Get the string value of text and choice fields
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Choice(c) => c.as_deref(),
            _ => None,
        }
    }

    /// Get the items of a list field
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Plain JSON form used in API payloads
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.trim().to_string()),
            Self::Choice(c) => c.clone().map(Value::String).unwrap_or(Value::Null),
            Self::List(items) => Value::from(items.clone()),
            Self::Date(d) => d
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
            Self::Flag(b) => Value::Bool(*b),
            Self::Number(n) => n.map(Value::from).unwrap_or(Value::Null),
        }
    }

    /// Parse a line of user input into a value of the given kind.
    ///
    /// A lone `-` clears optional kinds; lists are comma separated.
    pub fn parse_input(kind: FieldKind, input: &str) -> Result<Self, ValueParseError> {
        let input = input.trim();
        let cleared = input.is_empty() || input == "-";
        match kind {
            FieldKind::Text if input == "-" => Ok(Self::Text(String::new())),
            FieldKind::Text => Ok(Self::Text(input.to_string())),
            FieldKind::Choice => Ok(Self::Choice((!cleared).then(|| input.to_string()))),
            FieldKind::List => Ok(Self::List(if cleared {
                Vec::new()
            } else {
                input
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })),
            FieldKind::Date => {
                if cleared {
                    return Ok(Self::Date(None));
                }
                NaiveDate::parse_from_str(input, "%Y-%m-%d")
                    .map(|d| Self::Date(Some(d)))
                    .map_err(|_| ValueParseError::Date(input.to_string()))
            }
            FieldKind::Flag => match input.to_ascii_lowercase().as_str() {
                "y" | "yes" | "true" | "1" => Ok(Self::Flag(true)),
                "n" | "no" | "false" | "0" | "" | "-" => Ok(Self::Flag(false)),
                _ => Err(ValueParseError::Flag(input.to_string())),
            },
            FieldKind::Number => {
                if cleared {
                    return Ok(Self::Number(None));
                }
                input
                    .parse::<i64>()
                    .map(|n| Self::Number(Some(n)))
                    .map_err(|_| ValueParseError::Number(input.to_string()))
            }
        }
    }

    /// Get the display value for the shell
    pub fn display_value(&self) -> String {
        match self {
            Self::Text(s) if s.is_empty() => "(empty)".to_string(),
            Self::Text(s) => s.clone(),
            Self::Choice(Some(c)) => c.clone(),
            Self::List(items) if !items.is_empty() => items.join(", "),
            Self::Date(Some(d)) => d.format("%Y-%m-%d").to_string(),
            Self::Flag(true) => "yes".to_string(),
            Self::Flag(false) => "no".to_string(),
            Self::Number(Some(n)) => n.to_string(),
            Self::Choice(None) | Self::List(_) | Self::Date(None) | Self::Number(None) => {
                "(none)".to_string()
            }
        }
    }
}

/// Free-text "other" field tied to a sentinel item of a list field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    /// List field holding the sentinel
    pub field: String,
    /// Item that enables this field, e.g. `OTHER`
    pub sentinel: String,
}

/// Declaration of a single form field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub default: FieldValue,
    /// Options offered for choice and list fields
    #[serde(default)]
    pub options: Vec<String>,
    /// Kept out of the submitted payload
    #[serde(default)]
    pub ui_only: bool,
    #[serde(default)]
    pub companion_of: Option<Companion>,
}

impl FieldSpec {
    /// Create a new text field
    pub fn text(name: &str, label: &str) -> Self {
        Self::with_default(name, label, FieldValue::empty(FieldKind::Text))
    }

    /// Create a new single choice field
    pub fn choice(name: &str, label: &str, options: &[&str]) -> Self {
        let mut spec = Self::with_default(name, label, FieldValue::empty(FieldKind::Choice));
        spec.options = options.iter().map(|o| o.to_string()).collect();
        spec
    }

    /// Create a new multi-select field
    pub fn list(name: &str, label: &str, options: &[&str]) -> Self {
        let mut spec = Self::with_default(name, label, FieldValue::empty(FieldKind::List));
        spec.options = options.iter().map(|o| o.to_string()).collect();
        spec
    }

    pub fn date(name: &str, label: &str) -> Self {
        Self::with_default(name, label, FieldValue::empty(FieldKind::Date))
    }

    pub fn flag(name: &str, label: &str) -> Self {
        Self::with_default(name, label, FieldValue::empty(FieldKind::Flag))
    }

    pub fn number(name: &str, label: &str) -> Self {
        Self::with_default(name, label, FieldValue::empty(FieldKind::Number))
    }

    pub fn with_default(name: &str, label: &str, default: FieldValue) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            default,
            options: Vec::new(),
            ui_only: false,
            companion_of: None,
        }
    }

    /// Mark the field as UI-only
    pub fn ui_only(mut self) -> Self {
        self.ui_only = true;
        self
    }

    /// Tie this field to `sentinel` in the list field `field`
    pub fn companion_of(mut self, field: &str, sentinel: &str) -> Self {
        self.companion_of = Some(Companion {
            field: field.to_string(),
            sentinel: sentinel.to_string(),
        });
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.default.kind()
    }
}
