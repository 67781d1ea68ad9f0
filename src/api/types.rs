//! Wire types of the application API

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure talking to the API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not reach the server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Http { status: u16, message: String },
    #[error("{0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Response body shared by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    #[serde(deserialize_with = "status_text")]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ApiEnvelope {
    pub fn success(message: &str, payload: Option<Value>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            payload,
        }
    }

    #[cfg(test)]
    pub fn failure(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: message.to_string(),
            payload: None,
        }
    }

    /// `success`/`ok`, or a 2xx code
    pub fn is_success(&self) -> bool {
        let status = self.status.trim();
        status.eq_ignore_ascii_case("success")
            || status.eq_ignore_ascii_case("ok")
            || status
                .parse::<u16>()
                .is_ok_and(|code| (200..300).contains(&code))
    }
}

/// Accept `"success"` as well as `201` for the status field
fn status_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Bool(true) => Ok("success".to_string()),
        Value::Bool(false) => Ok("error".to_string()),
        other => Ok(other.to_string()),
    }
}

/// Signed-in user as returned by the login endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Bearer token and profile from a successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
}
