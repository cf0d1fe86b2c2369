//! Caller authentication for the Presence server
//!
//! Identity login itself belongs to the identity provider. This module only
//! checks the bearer token a caller presents and tracks failed code
//! submissions per subject.
//!
//! # Security Model
//!
//! - Tokens are HMAC-SHA256 signed claims with an expiry
//! - MAC comparison is constant time
//! - Error messages never echo token or secret material
//! - Progressive lockout slows down code guessing

mod lockout;
mod token;

pub use lockout::{Admission, AttemptTracker, LockoutPolicy};
pub use token::{Claims, SignedTokenVerifier, TOKEN_KEY_LEN};

use presence_core::{Role, ScopeId};

use crate::error::Result;

/// Authenticated actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier from the identity provider
    pub subject: String,
    /// Organization the actor belongs to
    pub scope: ScopeId,
    /// Role within the organization
    pub role: Role,
    /// Unix time after which the credential is no longer accepted
    pub expires_at: u64,
}

/// Turns a presented credential into an [`Identity`]
pub trait TokenVerifier: Send + Sync {
    /// Fails with `ProvisionError::Authentication` for missing, malformed,
    /// forged or expired tokens
    fn verify(&self, token: &str, now: u64) -> Result<Identity>;
}
