//! Time-step one-time code generation and verification (RFC 4226 / RFC 6238)
//!
//! The engine is a pure function of secret, time and configuration. It holds
//! no mutable state, so a single instance can be shared across any number of
//! concurrent callers.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::{
    Algorithm, CodeEngineConfig, Error, GeneratedCode, Result, Secret, VerificationResult,
    MAX_DRIFT_STEPS,
};

/// Code engine bound to a validated configuration
#[derive(Debug, Clone)]
pub struct CodeEngine {
    config: CodeEngineConfig,
    modulus: u64,
}

impl CodeEngine {
    /// Create an engine, rejecting out-of-range parameters
    pub fn new(config: CodeEngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            modulus: 10u64.pow(config.digits),
            config,
        })
    }

    pub fn config(&self) -> &CodeEngineConfig {
        &self.config
    }

    /// Time-step counter for a Unix timestamp
    pub fn counter_at(&self, now: u64) -> u64 {
        now / self.config.step_seconds
    }

    /// Start and end (exclusive) of the step containing `now`
    pub fn step_bounds(&self, now: u64) -> (u64, u64) {
        let start = self.counter_at(now) * self.config.step_seconds;
        (start, start.saturating_add(self.config.step_seconds))
    }

    /// Seconds until the next step boundary (always at least 1)
    pub fn seconds_until_next_step(&self, now: u64) -> u64 {
        let (_, end) = self.step_bounds(now);
        end.saturating_sub(now).max(1)
    }

    /// Milliseconds from `now_millis` until the next step boundary
    pub fn millis_until_next_step(&self, now_millis: u64) -> u64 {
        let step_millis = self.config.step_seconds.saturating_mul(1000);
        step_millis - now_millis % step_millis
    }

    /// Generate the code for the step containing `now`
    pub fn generate(&self, secret: &Secret, now: u64) -> GeneratedCode {
        let counter = self.counter_at(now);
        let (valid_from, valid_until) = self.step_bounds(now);

        GeneratedCode {
            code: self.generate_at_counter(secret, counter),
            counter,
            valid_from,
            valid_until,
        }
    }

    /// HOTP: derive the code for an explicit counter value
    pub fn generate_at_counter(&self, secret: &Secret, counter: u64) -> String {
        let message = counter.to_be_bytes();
        let digest = match self.config.algorithm {
            Algorithm::Sha1 => hmac_digest::<Hmac<Sha1>>(secret.as_bytes(), &message),
            Algorithm::Sha256 => hmac_digest::<Hmac<Sha256>>(secret.as_bytes(), &message),
            Algorithm::Sha512 => hmac_digest::<Hmac<Sha512>>(secret.as_bytes(), &message),
        };

        let value = u64::from(dynamic_truncate(&digest)) % self.modulus;
        format!("{:0width$}", value, width = self.config.digits as usize)
    }

    /// Check a submitted code against every step in
    /// `[counter - drift_steps, counter + drift_steps]`
    ///
    /// All candidates are compared in constant time without early exit. When
    /// more than one step matches, the one closest to the current step wins.
    /// A drift above [`MAX_DRIFT_STEPS`] is a configuration error.
    pub fn verify(
        &self,
        secret: &Secret,
        submitted: &str,
        now: u64,
        drift_steps: u32,
    ) -> Result<VerificationResult> {
        if drift_steps > MAX_DRIFT_STEPS {
            return Err(Error::Configuration(format!(
                "drift_steps must be at most {}, got {}",
                MAX_DRIFT_STEPS, drift_steps
            )));
        }
        Ok(self.verify_window(secret, submitted, now, drift_steps))
    }

    /// Verify using the configured drift window
    pub fn check(&self, secret: &Secret, submitted: &str, now: u64) -> VerificationResult {
        // Configured drift was validated when the engine was built
        self.verify_window(secret, submitted, now, self.config.drift_steps)
    }

    fn verify_window(
        &self,
        secret: &Secret,
        submitted: &str,
        now: u64,
        drift_steps: u32,
    ) -> VerificationResult {
        let submitted = submitted.trim();
        if submitted.len() != self.config.digits as usize
            || !submitted.bytes().all(|b| b.is_ascii_digit())
        {
            return VerificationResult::Rejected;
        }

        let counter = self.counter_at(now);
        let drift = i64::from(drift_steps);
        let offsets = std::iter::once(0).chain((1..=drift).flat_map(|d| [-d, d]));

        let mut matched = None;
        for offset in offsets {
            let Some(candidate) = counter.checked_add_signed(offset) else {
                continue;
            };

            let expected = self.generate_at_counter(secret, candidate);
            let equal: bool = expected.as_bytes().ct_eq(submitted.as_bytes()).into();
            if equal && matched.is_none() {
                matched = Some(offset);
            }
        }

        match matched {
            Some(step_offset) => VerificationResult::Accepted { step_offset },
            None => VerificationResult::Rejected,
        }
    }

}

impl Default for CodeEngine {
    fn default() -> Self {
        let config = CodeEngineConfig::default();
        Self {
            modulus: 10u64.pow(config.digits),
            config,
        }
    }
}

/// Generate a code with an unvalidated configuration
///
/// Convenience for one-off callers; fails with a configuration error instead
/// of requiring an engine to be built first.
pub fn generate_with(
    config: CodeEngineConfig,
    secret: &Secret,
    now: u64,
) -> Result<GeneratedCode> {
    Ok(CodeEngine::new(config)?.generate(secret, now))
}

fn hmac_digest<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// RFC 4226 section 5.3 dynamic truncation
fn dynamic_truncate(digest: &[u8]) -> u32 {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let word = [
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ];
    u32::from_be_bytes(word) & 0x7fff_ffff
}
