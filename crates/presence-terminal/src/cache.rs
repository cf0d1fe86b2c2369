//! Per-session cache of the fetched secret
//!
//! Purely an optimization: losing the cache only costs another fetch.

use std::collections::HashMap;
use std::sync::Mutex;

use presence_core::Secret;

/// Key the scope secret is cached under
pub const SECRET_KEY: &str = "key";

/// In-memory key/value cache, cleared on sign-out
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<String, Secret>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached scope secret, if any
    pub fn secret(&self) -> Option<Secret> {
        self.get(SECRET_KEY)
    }

    pub fn store_secret(&self, secret: Secret) {
        self.set(SECRET_KEY, secret);
    }

    pub fn get(&self, key: &str) -> Option<Secret> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub fn set(&self, key: &str, secret: Secret) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), secret);
        }
    }

    /// Drop every entry; secrets are zeroized as they are dropped
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.is_empty())
            .unwrap_or(true)
    }
}
