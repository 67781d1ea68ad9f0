//! HTTP client for the Uptick application API
//!
//! Every endpoint answers with an [`ApiEnvelope`]. A bearer token obtained
//! through [`HttpApiClient::login`] is attached to later requests.

use super::traits::ApplicationApi;
use super::types::{ApiEnvelope, ApiError, AuthSession};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// Default API base address
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

const APPLICATIONS_PATH: &str = "applications";
const LOGIN_PATH: &str = "auth/login";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the application API
#[derive(Debug)]
pub struct HttpApiClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("uptick-apply/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiEnvelope, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("API answered {status}");
        parse_envelope(status, &body)
    }

    /// Sign in and keep the returned bearer token for later requests
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let request = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .json(&json!({ "email": email, "password": password }));
        let envelope = self.send(request).await?;
        if !envelope.is_success() {
            return Err(ApiError::Rejected(envelope.message));
        }

        let payload = envelope
            .payload
            .ok_or_else(|| ApiError::Decode("login response has no payload".to_string()))?;
        let session: AuthSession =
            serde_json::from_value(payload).map_err(|e| ApiError::Decode(e.to_string()))?;

        self.set_token(Some(session.token.clone()));
        info!("Signed in as {}", session.user.email);
        Ok(session)
    }
}

#[async_trait]
impl ApplicationApi for HttpApiClient {
    async fn submit_application(&self, payload: &Value) -> Result<ApiEnvelope, ApiError> {
        let request = self
            .http
            .post(self.endpoint(APPLICATIONS_PATH))
            .json(payload);
        self.send(request).await
    }
}

/// Read an envelope from a response body.
///
/// Error statuses that still carry an envelope are returned as-is so the
/// server's message reaches the user. A 2xx answer without an envelope,
/// such as an empty 204, counts as success with no message.
fn parse_envelope(status: StatusCode, body: &str) -> Result<ApiEnvelope, ApiError> {
    match serde_json::from_str::<ApiEnvelope>(body) {
        Ok(envelope) if status.is_success() || !envelope.is_success() => Ok(envelope),
        Ok(envelope) => Ok(ApiEnvelope {
            status: status.as_u16().to_string(),
            ..envelope
        }),
        Err(_) if !status.is_success() => Err(ApiError::Http {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        }),
        Err(err) => {
            debug!("Treating {status} without an envelope as success: {err}");
            Ok(ApiEnvelope::success("", serde_json::from_str(body).ok()))
        }
    }
}
