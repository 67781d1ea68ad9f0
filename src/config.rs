//! Configuration handling for uptick-apply

use crate::api::DEFAULT_BASE_URL;
use crate::draft::DEFAULT_DELAY;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `api_base_url`
pub const API_URL_ENV: &str = "UPTICK_API_URL";
/// Overrides `api_token`
pub const API_TOKEN_ENV: &str = "UPTICK_API_TOKEN";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Base address of the application API
    pub api_base_url: Option<String>,
    /// Bearer token sent with API requests
    pub api_token: Option<String>,
    /// Directory holding draft files
    pub draft_dir: Option<PathBuf>,
    /// Autosave quiescence window in milliseconds
    pub autosave_delay_ms: Option<u64>,
    pub autosave_enabled: Option<bool>,
    /// JSON form definition replacing the built-in application form
    pub form_definition: Option<PathBuf>,
}

impl AppConfig {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("io", "uptick", "uptick-apply")
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from the user config file, then apply environment
    /// overrides
    pub fn load() -> Result<Self> {
        let config = match Self::config_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    /// Load configuration from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Replace API settings with non-empty values from `lookup`
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(API_URL_ENV) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = non_empty(API_TOKEN_ENV) {
            self.api_token = Some(token);
        }
        self
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Configured draft directory, else `drafts` under the platform data dir
    pub fn draft_dir(&self) -> PathBuf {
        self.draft_dir
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("drafts")))
            .unwrap_or_else(|| PathBuf::from(".uptick-drafts"))
    }

    pub fn autosave_delay(&self) -> Duration {
        self.autosave_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DELAY)
    }

    pub fn autosave_enabled(&self) -> bool {
        self.autosave_enabled.unwrap_or(true)
    }
}
