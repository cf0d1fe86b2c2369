//! Error types for the presenting terminal

use std::time::Duration;
use thiserror::Error;

/// Result type alias for terminal operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from fetching the scope secret
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the credential (HTTP 401)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The credential's role may not fetch the secret (HTTP 403)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Connection failure, server-side error or throttling
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Response did not have the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Core library error (e.g. undecodable secret)
    #[error("Core error: {0}")]
    Core(#[from] presence_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}
