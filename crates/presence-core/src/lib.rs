//! Presence Core - Rotating attendance code engine and shared types
//!
//! This crate provides the pure, side-effect-free pieces of the Presence
//! attendance verification system: the time-step one-time code engine,
//! the shared secret type, engine configuration and the clock abstraction
//! used by presenting terminals and verifying servers alike.

pub mod clock;
pub mod code;
pub mod config;
pub mod engine;
pub mod error;
pub mod secret;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::{GeneratedCode, VerificationResult};
pub use config::{Algorithm, CodeEngineConfig};
pub use engine::CodeEngine;
pub use error::{Error, Result};
pub use secret::Secret;
pub use types::{Role, ScopeId};

/// Default number of digits in a generated code
pub const DEFAULT_DIGITS: u32 = 6;

/// Smallest supported code length
pub const MIN_DIGITS: u32 = 6;

/// Largest supported code length (truncated values are 31 bits wide)
pub const MAX_DIGITS: u32 = 10;

/// Default time-step length in seconds
pub const DEFAULT_STEP_SECONDS: u64 = 30;

/// Default number of adjacent steps accepted on either side of the current one
pub const DEFAULT_DRIFT_STEPS: u32 = 1;

/// Upper bound on the verification drift window
pub const MAX_DRIFT_STEPS: u32 = 10;

/// Length in bytes of freshly generated secrets (160 bits)
pub const SECRET_LEN: usize = 20;
