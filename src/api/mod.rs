//! Client for the application HTTP API

mod client;
mod traits;
mod types;

pub use client::{HttpApiClient, DEFAULT_BASE_URL};
pub use traits::ApplicationApi;
pub use types::{ApiEnvelope, ApiError};

#[cfg(test)]
pub use traits::MockApplicationApi;
