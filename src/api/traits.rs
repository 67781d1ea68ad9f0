//! Trait abstraction for the application API to enable mocking in tests

use super::types::{ApiEnvelope, ApiError};
use async_trait::async_trait;
use serde_json::Value;

/// Endpoint receiving finished applications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplicationApi: Send + Sync {
    /// Post the serialized application and return the server's envelope
    async fn submit_application(&self, payload: &Value) -> Result<ApiEnvelope, ApiError>;
}
