//! Shared secret seeding code generation
//!
//! The secret is opaque key material. Its text form is unpadded RFC 4648
//! base32, the encoding authenticator apps and `otpauth://` URIs use.

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Shared secret for one scope
///
/// The bytes are zeroized when the value is dropped and never appear in
/// `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    bytes: Vec<u8>,
}

impl Secret {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidSecret("secret is empty".to_string()));
        }
        Ok(Self { bytes })
    }

    /// Parse a base32 secret
    ///
    /// Accepts lowercase, `=` padding, spaces and dashes, which are common
    /// when secrets are typed in by hand.
    pub fn from_base32(encoded: &str) -> Result<Self> {
        let normalized: String = encoded
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .trim_end_matches('=')
            .to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(Error::InvalidSecret("secret is empty".to_string()));
        }

        let bytes = BASE32_NOPAD
            .decode(normalized.as_bytes())
            .map_err(|e| Error::InvalidSecret(format!("not valid base32: {}", e)))?;

        Self::from_bytes(bytes)
    }

    /// Generate a fresh random secret from the OS CSPRNG
    #[cfg(feature = "rand")]
    pub fn generate() -> Self {
        use rand::rngs::OsRng;
        use rand::RngCore;

        let mut bytes = vec![0u8; crate::SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Encode as unpadded base32
    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED; {} bytes])", self.bytes.len())
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.len() == other.bytes.len()
            && bool::from(self.bytes.as_slice().ct_eq(other.bytes.as_slice()))
    }
}

impl Eq for Secret {}

impl std::str::FromStr for Secret {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base32(s)
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Secret::from_base32(&encoded).map_err(serde::de::Error::custom)
    }
}
