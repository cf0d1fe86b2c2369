//! Error types for the Presence core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Engine parameters are outside the supported range. This is a
    /// deployment bug, never a user-facing condition.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),
}
