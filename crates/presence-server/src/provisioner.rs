//! Authenticated issuance of scope secrets

use std::sync::Arc;
use tracing::{info, warn};

use presence_core::{Clock, ScopeId, Secret};

use crate::auth::{Identity, TokenVerifier};
use crate::error::{ProvisionError, Result};
use crate::store::SecretStore;

/// Secret handed back to an entitled caller
#[derive(Debug, Clone)]
pub struct ProvisionedSecret {
    pub scope: ScopeId,
    pub secret: Secret,
    pub generation: u32,
    /// True when this call provisioned the scope
    pub created: bool,
}

/// Hands out the shared secret for the caller's scope
///
/// The first entitled request for a scope creates its secret; later
/// requests get the same secret back until an explicit rotation.
pub struct SecretProvisioner {
    tokens: Arc<dyn TokenVerifier>,
    store: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
}

impl SecretProvisioner {
    pub fn new(
        tokens: Arc<dyn TokenVerifier>,
        store: Arc<dyn SecretStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            store,
            clock,
        }
    }

    /// Return (or create) the secret for the token holder's scope
    pub fn get_secret(&self, token: &str) -> Result<ProvisionedSecret> {
        let identity = self.authorize(token, "fetch")?;

        let (record, created) = self
            .store
            .get_or_create(&identity.scope, Secret::generate())?;

        info!(
            scope = %identity.scope,
            subject = %identity.subject,
            generation = record.generation,
            created,
            at = self.clock.now_unix(),
            "Issued scope secret"
        );

        Ok(ProvisionedSecret {
            scope: record.scope,
            secret: record.secret,
            generation: record.generation,
            created,
        })
    }

    /// Replace the scope secret with a fresh one
    ///
    /// Codes derived from the previous secret stop verifying immediately.
    pub fn rotate_secret(&self, token: &str) -> Result<ProvisionedSecret> {
        let identity = self.authorize(token, "rotate")?;

        let record = self.store.rotate(&identity.scope, Secret::generate())?;

        info!(
            scope = %identity.scope,
            subject = %identity.subject,
            generation = record.generation,
            at = self.clock.now_unix(),
            "Rotated scope secret"
        );

        Ok(ProvisionedSecret {
            scope: record.scope,
            secret: record.secret,
            generation: record.generation,
            created: record.generation == 1,
        })
    }

    fn authorize(&self, token: &str, action: &str) -> Result<Identity> {
        let now = self.clock.now_unix();
        let identity = self.tokens.verify(token, now).map_err(|e| {
            warn!(action, at = now, "Rejected secret request: {}", e);
            e
        })?;

        if !identity.role.can_provision() {
            warn!(
                scope = %identity.scope,
                subject = %identity.subject,
                role = %identity.role,
                action,
                at = now,
                "Role not entitled to provision codes"
            );
            return Err(ProvisionError::Authorization(format!(
                "role '{}' may not {} the scope secret",
                identity.role, action
            )));
        }

        Ok(identity)
    }
}
