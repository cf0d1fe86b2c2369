//! Compact signed identity tokens
//!
//! Format: `base64url(claims JSON) "." base64url(HMAC-SHA256(key, claims part))`

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use presence_core::{Role, ScopeId};

use super::{Identity, TokenVerifier};
use crate::error::{ProvisionError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of the token signing key in bytes
pub const TOKEN_KEY_LEN: usize = 32;

/// Signed token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub scope: ScopeId,
    pub role: Role,
    pub exp: u64,
    pub jti: String,
}

/// Verifies (and, for operators and tests, mints) signed tokens
///
/// The signing key is zeroized when the verifier is dropped.
pub struct SignedTokenVerifier {
    key: [u8; TOKEN_KEY_LEN],
}

impl SignedTokenVerifier {
    pub fn new(key: [u8; TOKEN_KEY_LEN]) -> Self {
        Self { key }
    }

    /// Mint a token for an identity
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let claims = Claims {
            sub: identity.subject.clone(),
            scope: identity.scope.clone(),
            role: identity.role,
            exp: identity.expires_at,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes()));
        Ok(format!("{}.{}", payload, signature))
    }

    fn mac(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl TokenVerifier for SignedTokenVerifier {
    fn verify(&self, token: &str, now: u64) -> Result<Identity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ProvisionError::Authentication(
                "missing credential".to_string(),
            ));
        }

        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| ProvisionError::Authentication("malformed token".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| ProvisionError::Authentication("malformed token".to_string()))?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ProvisionError::Authentication("invalid token signature".to_string()))?;

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| ProvisionError::Authentication("malformed token claims".to_string()))?;

        if now >= claims.exp {
            return Err(ProvisionError::Authentication("token expired".to_string()));
        }

        Ok(Identity {
            subject: claims.sub,
            scope: claims.scope,
            role: claims.role,
            expires_at: claims.exp,
        })
    }
}

impl Drop for SignedTokenVerifier {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role, expires_at: u64) -> Identity {
        Identity {
            subject: "user-1".to_string(),
            scope: ScopeId::new("acme").unwrap(),
            role,
            expires_at,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let verifier = SignedTokenVerifier::new([7u8; TOKEN_KEY_LEN]);
        let token = verifier.issue(&identity(Role::Admin, 2_000)).unwrap();

        let verified = verifier.verify(&token, 1_000).unwrap();
        assert_eq!(verified, identity(Role::Admin, 2_000));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = SignedTokenVerifier::new([7u8; TOKEN_KEY_LEN]);
        let token = verifier.issue(&identity(Role::Admin, 2_000)).unwrap();

        let err = verifier.verify(&token, 2_000).unwrap_err();
        assert!(matches!(err, ProvisionError::Authentication(ref m) if m.contains("expired")));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let issuer = SignedTokenVerifier::new([1u8; TOKEN_KEY_LEN]);
        let verifier = SignedTokenVerifier::new([2u8; TOKEN_KEY_LEN]);
        let token = issuer.issue(&identity(Role::Admin, 2_000)).unwrap();

        assert!(matches!(
            verifier.verify(&token, 1_000),
            Err(ProvisionError::Authentication(_))
        ));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let verifier = SignedTokenVerifier::new([7u8; TOKEN_KEY_LEN]);
        let token = verifier.issue(&identity(Role::Employee, 2_000)).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        // Re-encode the claims with an elevated role, keep the old signature
        let forged_claims = Claims {
            sub: "user-1".to_string(),
            scope: ScopeId::new("acme").unwrap(),
            role: Role::Admin,
            exp: 2_000,
            jti: "forged".to_string(),
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}", forged_payload, signature);

        assert!(verifier.verify(&forged, 1_000).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let verifier = SignedTokenVerifier::new([7u8; TOKEN_KEY_LEN]);
        for token in ["", "   ", "no-dot", "a.b", "!!!.???"] {
            assert!(
                matches!(
                    verifier.verify(token, 0),
                    Err(ProvisionError::Authentication(_))
                ),
                "token {:?} should be rejected",
                token
            );
        }
    }
}
