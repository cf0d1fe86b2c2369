//! Code engine configuration

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result, DEFAULT_DIGITS, DEFAULT_DRIFT_STEPS, DEFAULT_STEP_SECONDS, MAX_DIGITS,
    MAX_DRIFT_STEPS, MIN_DIGITS,
};

/// Keyed hash used to derive codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    /// HMAC-SHA1, what authenticator apps expect
    #[default]
    Sha1,
    /// HMAC-SHA256
    Sha256,
    /// HMAC-SHA512
    Sha512,
}

impl Algorithm {
    /// Name as used in `otpauth://` URIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable parameters for code generation and verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeEngineConfig {
    /// Number of decimal digits in a code
    pub digits: u32,

    /// Length of one time step in seconds
    pub step_seconds: u64,

    /// Steps of clock drift tolerated on either side during verification
    pub drift_steps: u32,

    /// Keyed hash algorithm
    pub algorithm: Algorithm,
}

impl Default for CodeEngineConfig {
    fn default() -> Self {
        Self {
            digits: DEFAULT_DIGITS,
            step_seconds: DEFAULT_STEP_SECONDS,
            drift_steps: DEFAULT_DRIFT_STEPS,
            algorithm: Algorithm::Sha1,
        }
    }
}

impl CodeEngineConfig {
    /// Create a configuration with custom digits and step length
    pub fn new(digits: u32, step_seconds: u64) -> Self {
        Self {
            digits,
            step_seconds,
            ..Self::default()
        }
    }

    pub fn with_drift(mut self, drift_steps: u32) -> Self {
        self.drift_steps = drift_steps;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Check that every parameter is inside the supported range
    pub fn validate(&self) -> Result<()> {
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&self.digits) {
            return Err(Error::Configuration(format!(
                "digits must be between {} and {}, got {}",
                MIN_DIGITS, MAX_DIGITS, self.digits
            )));
        }

        if self.step_seconds == 0 {
            return Err(Error::Configuration(
                "step_seconds must be greater than zero".to_string(),
            ));
        }

        if self.drift_steps > MAX_DRIFT_STEPS {
            return Err(Error::Configuration(format!(
                "drift_steps must be at most {}, got {}",
                MAX_DRIFT_STEPS, self.drift_steps
            )));
        }

        Ok(())
    }
}
