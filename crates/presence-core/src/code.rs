//! Generated codes and verification outcomes

use serde::{Deserialize, Serialize};

/// Code valid for one time step
///
/// Transient: recomputed on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    /// Fixed-width decimal code, left-padded with zeros
    pub code: String,

    /// Time-step counter the code was derived from
    pub counter: u64,

    /// Unix time at which this step began
    pub valid_from: u64,

    /// Unix time of the next step boundary, when the code expires
    pub valid_until: u64,
}

impl GeneratedCode {
    /// Seconds left before the code rolls over
    pub fn seconds_remaining(&self, now: u64) -> u64 {
        self.valid_until.saturating_sub(now)
    }

    /// Check if the code has rolled over at the given timestamp
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.valid_until
    }
}

impl std::fmt::Display for GeneratedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

/// Outcome of checking a submitted code
///
/// `Rejected` is an ordinary negative answer, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum VerificationResult {
    /// The code matched the step at `step_offset` relative to the current
    /// one (0 = current, -1 = previous, 1 = next)
    Accepted { step_offset: i64 },
    /// No step inside the drift window produced the code
    Rejected,
}

impl VerificationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VerificationResult::Accepted { .. })
    }

    /// Matched step offset, if accepted
    pub fn step_offset(&self) -> Option<i64> {
        match self {
            VerificationResult::Accepted { step_offset } => Some(*step_offset),
            VerificationResult::Rejected => None,
        }
    }
}
