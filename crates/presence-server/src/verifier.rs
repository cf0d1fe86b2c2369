//! Verification of codes submitted by employees
//!
//! Produces the accept/reject answer the attendance writer acts on. Writing
//! the clock-in record itself happens downstream.

use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use presence_core::{Clock, CodeEngine, ScopeId, VerificationResult};

use crate::auth::{Admission, AttemptTracker, LockoutPolicy, TokenVerifier};
use crate::error::{ProvisionError, Result};
use crate::store::SecretStore;

/// Outcome of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub subject: String,
    pub scope: ScopeId,
    pub result: VerificationResult,
    /// Unix time the code was checked against
    pub checked_at: u64,
}

/// Checks submitted codes against the submitter's scope secret
pub struct AttendanceVerifier {
    tokens: Arc<dyn TokenVerifier>,
    store: Arc<dyn SecretStore>,
    engine: CodeEngine,
    clock: Arc<dyn Clock>,
    attempts: Mutex<AttemptTracker>,
}

impl AttendanceVerifier {
    pub fn new(
        tokens: Arc<dyn TokenVerifier>,
        store: Arc<dyn SecretStore>,
        engine: CodeEngine,
        clock: Arc<dyn Clock>,
        lockout: LockoutPolicy,
    ) -> Self {
        Self {
            tokens,
            store,
            engine,
            clock,
            attempts: Mutex::new(AttemptTracker::new(lockout)),
        }
    }

    pub fn engine(&self) -> &CodeEngine {
        &self.engine
    }

    /// Check a code submitted by the token holder
    ///
    /// A rejected code is returned as `VerificationResult::Rejected`, not as
    /// an error.
    pub fn submit(&self, token: &str, code: &str) -> Result<Submission> {
        let now = self.clock.now_unix();
        let identity = self.tokens.verify(token, now)?;

        let record = self.store.load(&identity.scope)?.ok_or_else(|| {
            ProvisionError::NotProvisioned(identity.scope.to_string())
        })?;

        // Counted as a failure up front and forgiven on acceptance
        let lockout = match self.tracker()?.admit(&identity.subject, now) {
            Admission::Admitted { lockout_secs } => lockout_secs,
            Admission::Locked { retry_after_secs } => {
                warn!(
                    scope = %identity.scope,
                    subject = %identity.subject,
                    retry_after_secs,
                    "Submission while locked out"
                );
                return Err(ProvisionError::LockedOut { retry_after_secs });
            }
        };

        let result = self.engine.check(&record.secret, code, now);

        match result {
            VerificationResult::Accepted { step_offset } => {
                self.tracker()?.record_success(&identity.subject);
                info!(
                    scope = %identity.scope,
                    subject = %identity.subject,
                    step_offset,
                    at = now,
                    "Code accepted"
                );
            }
            VerificationResult::Rejected => {
                debug!(
                    scope = %identity.scope,
                    subject = %identity.subject,
                    at = now,
                    "Code rejected"
                );
                if let Some(secs) = lockout {
                    warn!(
                        scope = %identity.scope,
                        subject = %identity.subject,
                        lockout_secs = secs,
                        "Subject locked out after repeated rejections"
                    );
                }
            }
        }

        Ok(Submission {
            subject: identity.subject,
            scope: identity.scope,
            result,
            checked_at: now,
        })
    }

    fn tracker(&self) -> Result<std::sync::MutexGuard<'_, AttemptTracker>> {
        self.attempts
            .lock()
            .map_err(|_| ProvisionError::Store("attempt tracker lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Identity, SignedTokenVerifier, TOKEN_KEY_LEN};
    use crate::store::{MemorySecretStore, StoredSecret};
    use presence_core::{ManualClock, Role, Secret};
    use std::sync::Barrier;

    struct Fixture {
        tokens: Arc<SignedTokenVerifier>,
        store: Arc<MemorySecretStore>,
        clock: ManualClock,
        verifier: AttendanceVerifier,
    }

    fn fixture() -> Fixture {
        let tokens = Arc::new(SignedTokenVerifier::new([9u8; TOKEN_KEY_LEN]));
        let store = Arc::new(MemorySecretStore::new());
        let clock = ManualClock::new(59);
        let verifier = AttendanceVerifier::new(
            tokens.clone(),
            store.clone(),
            CodeEngine::default(),
            Arc::new(clock.clone()),
            LockoutPolicy::strict(),
        );
        Fixture {
            tokens,
            store,
            clock,
            verifier,
        }
    }

    fn employee_token(f: &Fixture) -> String {
        f.tokens
            .issue(&Identity {
                subject: "emp-7".to_string(),
                scope: ScopeId::new("acme").unwrap(),
                role: Role::Employee,
                expires_at: u64::MAX,
            })
            .unwrap()
    }

    fn provision(f: &Fixture) {
        f.store
            .get_or_create(
                &ScopeId::new("acme").unwrap(),
                Secret::from_base32("JBSWY3DPEHPK3PXP").unwrap(),
            )
            .unwrap();
    }

    #[test]
    fn test_accepts_current_code() {
        let f = fixture();
        provision(&f);

        let submission = f.verifier.submit(&employee_token(&f), "996554").unwrap();
        assert_eq!(
            submission.result,
            VerificationResult::Accepted { step_offset: 0 }
        );
        assert_eq!(submission.subject, "emp-7");
        assert_eq!(submission.checked_at, 59);
    }

    #[test]
    fn test_accepts_previous_step_within_drift() {
        let f = fixture();
        provision(&f);
        f.clock.set(75);

        let submission = f.verifier.submit(&employee_token(&f), "996554").unwrap();
        assert_eq!(submission.result.step_offset(), Some(-1));
    }

    #[test]
    fn test_rejection_is_not_an_error() {
        let f = fixture();
        provision(&f);

        let submission = f.verifier.submit(&employee_token(&f), "000000").unwrap();
        assert_eq!(submission.result, VerificationResult::Rejected);
    }

    #[test]
    fn test_unprovisioned_scope() {
        let f = fixture();
        assert!(matches!(
            f.verifier.submit(&employee_token(&f), "996554"),
            Err(ProvisionError::NotProvisioned(_))
        ));
    }

    #[test]
    fn test_requires_valid_token() {
        let f = fixture();
        provision(&f);
        assert!(matches!(
            f.verifier.submit("forged.token", "996554"),
            Err(ProvisionError::Authentication(_))
        ));
    }

    #[test]
    fn test_lockout_after_repeated_rejections() {
        let f = fixture();
        provision(&f);
        let token = employee_token(&f);

        for _ in 0..3 {
            let submission = f.verifier.submit(&token, "000000").unwrap();
            assert!(!submission.result.is_accepted());
        }

        // Even the right code is refused while locked out
        assert!(matches!(
            f.verifier.submit(&token, "996554"),
            Err(ProvisionError::LockedOut { retry_after_secs: 60 })
        ));

        // Lock expires; code for the new time is accepted and resets the count
        f.clock.set(59 + 60);
        let code = f
            .verifier
            .engine()
            .generate(&Secret::from_base32("JBSWY3DPEHPK3PXP").unwrap(), 119)
            .code;
        assert!(f.verifier.submit(&token, &code).unwrap().result.is_accepted());
    }

    /// Holds every `load` until all submitters have arrived, so their
    /// checks genuinely overlap
    struct GatedStore {
        inner: MemorySecretStore,
        gate: Barrier,
    }

    impl SecretStore for GatedStore {
        fn load(&self, scope: &ScopeId) -> Result<Option<StoredSecret>> {
            self.gate.wait();
            self.inner.load(scope)
        }

        fn get_or_create(&self, scope: &ScopeId, candidate: Secret) -> Result<(StoredSecret, bool)> {
            self.inner.get_or_create(scope, candidate)
        }

        fn rotate(&self, scope: &ScopeId, secret: Secret) -> Result<StoredSecret> {
            self.inner.rotate(scope, secret)
        }
    }

    #[test]
    fn test_parallel_guesses_limited_by_lockout() {
        const SUBMITTERS: usize = 20;

        let tokens = Arc::new(SignedTokenVerifier::new([9u8; TOKEN_KEY_LEN]));
        let store = Arc::new(GatedStore {
            inner: MemorySecretStore::new(),
            gate: Barrier::new(SUBMITTERS),
        });
        store
            .get_or_create(
                &ScopeId::new("acme").unwrap(),
                Secret::from_base32("JBSWY3DPEHPK3PXP").unwrap(),
            )
            .unwrap();
        let policy = LockoutPolicy::strict();
        let threshold = policy.threshold as usize;
        let verifier = AttendanceVerifier::new(
            tokens.clone(),
            store,
            CodeEngine::default(),
            Arc::new(ManualClock::new(59)),
            policy,
        );
        let token = tokens
            .issue(&Identity {
                subject: "emp-7".to_string(),
                scope: ScopeId::new("acme").unwrap(),
                role: Role::Employee,
                expires_at: u64::MAX,
            })
            .unwrap();

        let outcomes: Vec<Result<Submission>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..SUBMITTERS)
                .map(|i| {
                    let verifier = &verifier;
                    let token = &token;
                    // Distinct wrong guesses (996554 is the right one)
                    scope.spawn(move || verifier.submit(token, &format!("{:06}", 100_000 + i)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let evaluated = outcomes.iter().filter(|o| o.is_ok()).count();
        let locked = outcomes
            .iter()
            .filter(|o| matches!(o, Err(ProvisionError::LockedOut { .. })))
            .count();
        assert_eq!(evaluated, threshold);
        assert_eq!(locked, SUBMITTERS - threshold);
        assert!(outcomes
            .iter()
            .flatten()
            .all(|submission| !submission.result.is_accepted()));
    }
}
