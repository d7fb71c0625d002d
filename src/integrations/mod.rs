//! Read-only normalization of external issue-tracker and time-tracker data.
//!
//! Requests go through a [`Transport`], which owns the base URL, the
//! authentication header and the HTTP client. Responses are decoded into
//! small display types that never enter the persisted snapshot.

pub mod fetch;
pub mod github;
pub mod http;
pub mod toggl;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("No API token configured")]
    MissingToken,
}

impl From<serde_json::Error> for IntegrationError {
    fn from(e: serde_json::Error) -> Self {
        IntegrationError::Malformed(e.to_string())
    }
}

/// Performs an authenticated GET against one service and returns the JSON body.
/// Non-2xx responses are reported as [`IntegrationError::Status`].
pub trait Transport {
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value, IntegrationError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value, IntegrationError> {
        (**self).get_json(path, query)
    }
}

/// Transport used when no token is configured; every request fails
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl Transport for Disconnected {
    fn get_json(&self, path: &str, _query: &[(&str, String)]) -> Result<serde_json::Value, IntegrationError> {
        Err(IntegrationError::Transport(format!(
            "no HTTP client available for {}",
            path
        )))
    }
}
