//! Progressive lockout for code submissions
//!
//! Six-digit codes are guessable given enough attempts, so rejected
//! submissions are counted per subject and lock the subject out for
//! increasing periods:
//!
//! - 1-4 failures: No lockout (allow typos)
//! - 5 failures: 30 second lockout
//! - 6 failures: 5 minute lockout
//! - 7 failures: 30 minute lockout
//! - 8+ failures: 24 hour lockout

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Progressive lockout policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Failures before the first lockout
    pub threshold: u32,
    /// Lockout durations for each level (in seconds)
    pub lockout_durations: Vec<u64>,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            lockout_durations: vec![
                30,    // 5 failures: 30 seconds
                300,   // 6 failures: 5 minutes
                1800,  // 7 failures: 30 minutes
                86400, // 8+ failures: 24 hours
            ],
        }
    }
}

impl LockoutPolicy {
    /// Create a strict policy (locks out sooner, longer durations)
    pub fn strict() -> Self {
        Self {
            threshold: 3,
            lockout_durations: vec![60, 600, 3600, 86400],
        }
    }

    /// Lockout length in seconds after the given number of failures, if any
    pub fn lockout_secs(&self, failed_attempts: u32) -> Option<u64> {
        if failed_attempts < self.threshold || self.lockout_durations.is_empty() {
            return None;
        }

        let lockout_level = (failed_attempts - self.threshold) as usize;
        let duration_index = lockout_level.min(self.lockout_durations.len() - 1);

        Some(self.lockout_durations[duration_index])
    }
}

#[derive(Clone, Debug, Default)]
struct AttemptState {
    failures: u32,
    locked_until: Option<u64>,
}

/// Outcome of asking to check one more code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The attempt is counted; a lockout that it triggered is reported
    Admitted { lockout_secs: Option<u64> },
    /// The subject must wait before trying again
    Locked { retry_after_secs: u64 },
}

/// Per-subject failure counters
///
/// Time is passed in as Unix seconds so callers decide which clock applies.
/// Attempts are counted as failures when admitted and forgiven on success,
/// so concurrent guesses cannot all slip past the lock check.
#[derive(Debug, Default)]
pub struct AttemptTracker {
    policy: LockoutPolicy,
    subjects: HashMap<String, AttemptState>,
}

impl AttemptTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            subjects: HashMap::new(),
        }
    }

    /// Seconds the subject must still wait, or `None` if it may submit now
    pub fn locked_for(&self, subject: &str, now: u64) -> Option<u64> {
        self.subjects
            .get(subject)
            .and_then(|state| state.locked_until)
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Check the lock and count the attempt in one step
    pub fn admit(&mut self, subject: &str, now: u64) -> Admission {
        if let Some(retry_after_secs) = self.locked_for(subject, now) {
            return Admission::Locked { retry_after_secs };
        }
        Admission::Admitted {
            lockout_secs: self.record_failure(subject, now),
        }
    }

    /// Count a rejected submission, returning the new lockout length if one
    /// was triggered
    pub fn record_failure(&mut self, subject: &str, now: u64) -> Option<u64> {
        let state = self.subjects.entry(subject.to_string()).or_default();
        state.failures = state.failures.saturating_add(1);

        let lockout = self.policy.lockout_secs(state.failures);
        state.locked_until = lockout.map(|secs| now.saturating_add(secs));
        lockout
    }

    /// Clear the subject's history after an accepted submission
    pub fn record_success(&mut self, subject: &str) {
        self.subjects.remove(subject);
    }

    pub fn failures(&self, subject: &str) -> u32 {
        self.subjects.get(subject).map(|s| s.failures).unwrap_or(0)
    }
}
