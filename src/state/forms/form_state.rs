//! Form state: the ordered field values owned by the form controller

use super::field::{FieldKind, FieldSpec, FieldValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected field update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldUpdateError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{field}' holds a {expected} value, got {found}")]
    KindMismatch {
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },
}

/// Field name to value, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormState {
    values: IndexMap<String, FieldValue>,
}

impl FormState {
    /// Fresh state holding every declared default
    pub fn from_defaults(fields: &[FieldSpec]) -> Self {
        Self {
            values: fields
                .iter()
                .map(|spec| (spec.name.clone(), spec.default.clone()))
                .collect(),
        }
    }

    /// Rebuild state from previously saved values.
    ///
    /// Fields missing from `saved` keep their defaults and names that are no
    /// longer declared are dropped. A saved value of the wrong kind makes the
    /// whole set incompatible.
    pub fn restore(
        fields: &[FieldSpec],
        saved: IndexMap<String, FieldValue>,
    ) -> Result<Self, FieldUpdateError> {
        let mut state = Self::from_defaults(fields);
        for (name, value) in saved {
            if state.values.contains_key(&name) {
                state.set(&name, value)?;
            }
        }
        Ok(state)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Replace the value of a declared field, keeping its kind
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<(), FieldUpdateError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| FieldUpdateError::UnknownField(name.to_string()))?;
        if slot.kind() != value.kind() {
            return Err(FieldUpdateError::KindMismatch {
                field: name.to_string(),
                expected: slot.kind(),
                found: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Owned copy of the values, as stored in drafts
    pub fn to_values(&self) -> IndexMap<String, FieldValue> {
        self.values.clone()
    }
}
