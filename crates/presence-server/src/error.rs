//! Error types for the Presence server

use thiserror::Error;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that can occur while provisioning secrets or verifying codes
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Missing, malformed, forged or expired credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authenticated, but the role may not perform the operation
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// No secret has been issued for the caller's scope yet
    #[error("Scope not provisioned: {0}")]
    NotProvisioned(String),

    /// Too many rejected codes for this subject
    #[error("Too many failed attempts - retry in {retry_after_secs} seconds")]
    LockedOut { retry_after_secs: u64 },

    /// Secret store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] presence_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A blocking worker task failed to complete
    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl ProvisionError {
    /// Stable machine-readable kind, used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::Authentication(_) => "authentication",
            ProvisionError::Authorization(_) => "authorization",
            ProvisionError::NotProvisioned(_) => "not_provisioned",
            ProvisionError::LockedOut { .. } => "locked_out",
            ProvisionError::Config(_) | ProvisionError::Core(_) => "configuration",
            ProvisionError::Store(_)
            | ProvisionError::Io(_)
            | ProvisionError::Serialization(_)
            | ProvisionError::Worker(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(e: serde_json::Error) -> Self {
        ProvisionError::Serialization(e.to_string())
    }
}
