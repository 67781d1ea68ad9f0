//! Serialized copies of the form state

use crate::state::{FieldSpec, FieldUpdateError, FieldValue, FormState};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Layout version written into every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

/// Why a stored draft could not seed the form
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("draft is not a snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("draft has layout version {found}, expected {}", SNAPSHOT_VERSION)]
    Version { found: u32 },
    #[error("draft does not fit the form: {0}")]
    Incompatible(#[from] FieldUpdateError),
}

/// Immutable copy of the form values at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub values: IndexMap<String, FieldValue>,
}

impl DraftSnapshot {
    pub fn capture(state: &FormState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            values: state.to_values(),
        }
    }

    pub fn to_json(&self) -> Value {
        // A map of strings to plain enums always serializes
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_json(value: Value) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_value(value)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }

    /// Rebuild form state for the given declarations
    pub fn restore(self, fields: &[FieldSpec]) -> Result<FormState, SnapshotError> {
        Ok(FormState::restore(fields, self.values)?)
    }
}
