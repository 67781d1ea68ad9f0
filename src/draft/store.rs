//! Key/value draft persistence
//!
//! Stores never fail outward: write problems are logged and dropped, and a
//! missing, unreadable or corrupt entry loads as `None`.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Durable key/value medium for drafts
pub trait DraftStore: Send + Sync {
    /// Persist `value` under `key`, replacing any earlier entry
    fn save(&self, key: &str, value: &Value);

    /// Previously saved value, or `None` if missing or unreadable
    fn load(&self, key: &str) -> Option<Value>;

    /// Delete the entry; removing a missing key is a no-op
    fn remove(&self, key: &str);
}

/// Numbers temporary files so concurrent writers never share one
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(anyhow!("Invalid draft key '{key}'"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let content = serde_json::to_string(value)?;
        // Write beside the entry, then rename over it
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}-{seq}.tmp", std::process::id()));
        fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(key)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("Failed to read {}", path.display())),
        };
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt draft {}", path.display()))?;
        Ok(Some(value))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                Err(err).with_context(|| format!("Failed to remove {}", path.display()))
            }
            _ => Ok(()),
        }
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, key: &str, value: &Value) {
        match self.write(key, value) {
            Ok(()) => debug!("Saved draft '{key}'"),
            Err(err) => warn!("Draft autosave failed: {err:#}"),
        }
    }

    fn load(&self, key: &str) -> Option<Value> {
        self.read(key).unwrap_or_else(|err| {
            warn!("Ignoring stored draft: {err:#}");
            None
        })
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.delete(key) {
            warn!("Draft removal failed: {err:#}");
        }
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, key: &str, value: &Value) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
    }

    fn load(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
