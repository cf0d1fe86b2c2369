//! Presence server
//!
//! Hands each organization (scope) its shared code secret and verifies the
//! codes employees type in at clock-in.
//!
//! # Architecture
//!
//! ```text
//! Terminal ──GET secrettotp──► SecretProvisioner ──► SecretStore
//! Employee ──POST verify────► AttendanceVerifier ──► CodeEngine
//! ```
//!
//! Both services authenticate callers through a [`auth::TokenVerifier`].

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod provisioner;
pub mod store;
pub mod verifier;

pub use config::ServerConfig;
pub use error::{ProvisionError, Result};
pub use provisioner::{ProvisionedSecret, SecretProvisioner};
pub use store::{FileSecretStore, MemorySecretStore, SecretStore, StoredSecret};
pub use verifier::{AttendanceVerifier, Submission};
