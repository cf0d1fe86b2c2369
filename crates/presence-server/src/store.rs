//! Scope secret storage
//!
//! Every store guarantees at most one secret is created per scope, even when
//! several first requests race: all racers get the winner's secret back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use presence_core::{ScopeId, Secret};

use crate::error::{ProvisionError, Result};

/// Secret record for one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSecret {
    /// Scope the secret belongs to
    pub scope: ScopeId,

    /// The shared secret (base32 on disk)
    pub secret: Secret,

    /// 1 for the first secret, incremented on every rotation
    pub generation: u32,

    /// When the scope was first provisioned
    pub created_at: DateTime<Utc>,

    /// When the secret was last rotated
    pub rotated_at: Option<DateTime<Utc>>,
}

impl StoredSecret {
    /// First-generation record
    pub fn new(scope: ScopeId, secret: Secret) -> Self {
        Self {
            scope,
            secret,
            generation: 1,
            created_at: Utc::now(),
            rotated_at: None,
        }
    }

    /// Successor record carrying a new secret
    pub fn rotated(&self, secret: Secret) -> Self {
        Self {
            scope: self.scope.clone(),
            secret,
            generation: self.generation.saturating_add(1),
            created_at: self.created_at,
            rotated_at: Some(Utc::now()),
        }
    }
}

/// Backing store for scope secrets
pub trait SecretStore: Send + Sync {
    /// Load the scope's current secret, if provisioned
    fn load(&self, scope: &ScopeId) -> Result<Option<StoredSecret>>;

    /// Return the existing secret, or atomically store `candidate` if the
    /// scope has none. The flag is true only for the caller whose candidate
    /// was stored.
    fn get_or_create(&self, scope: &ScopeId, candidate: Secret) -> Result<(StoredSecret, bool)>;

    /// Replace the scope's secret, provisioning it if absent
    fn rotate(&self, scope: &ScopeId, secret: Secret) -> Result<StoredSecret>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<ScopeId, StoredSecret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ScopeId, StoredSecret>>> {
        self.secrets
            .lock()
            .map_err(|_| ProvisionError::Store("secret store lock poisoned".to_string()))
    }
}

impl SecretStore for MemorySecretStore {
    fn load(&self, scope: &ScopeId) -> Result<Option<StoredSecret>> {
        Ok(self.lock()?.get(scope).cloned())
    }

    fn get_or_create(&self, scope: &ScopeId, candidate: Secret) -> Result<(StoredSecret, bool)> {
        let mut secrets = self.lock()?;
        if let Some(existing) = secrets.get(scope) {
            return Ok((existing.clone(), false));
        }

        let record = StoredSecret::new(scope.clone(), candidate);
        secrets.insert(scope.clone(), record.clone());
        Ok((record, true))
    }

    fn rotate(&self, scope: &ScopeId, secret: Secret) -> Result<StoredSecret> {
        let mut secrets = self.lock()?;
        let record = match secrets.get(scope) {
            Some(existing) => existing.rotated(secret),
            None => StoredSecret::new(scope.clone(), secret),
        };
        secrets.insert(scope.clone(), record.clone());
        Ok(record)
    }
}

/// One JSON file per scope
///
/// Creation writes a temp file and hard-links it to the final name. The link
/// fails if the name already exists, so exactly one creator wins even across
/// processes sharing the directory. Rotation replaces the file by rename.
pub struct FileSecretStore {
    /// Base path for storage
    store_path: PathBuf,

    /// Serializes writers within this process
    write_lock: Mutex<()>,
}

impl FileSecretStore {
    /// Open (and create if needed) a store directory
    pub fn new(store_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&store_path)?;
        Ok(Self {
            store_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    /// Get path for a scope's secret file
    fn scope_path(&self, scope: &ScopeId) -> PathBuf {
        self.store_path.join(format!("{}.json", scope))
    }

    fn temp_path(&self, scope: &ScopeId) -> PathBuf {
        self.store_path
            .join(format!(".{}.{}.tmp", scope, uuid::Uuid::new_v4().simple()))
    }

    fn read_record(path: &Path) -> Result<StoredSecret> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_temp(&self, scope: &ScopeId, record: &StoredSecret) -> Result<PathBuf> {
        let temp_path = self.temp_path(scope);
        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(&temp_path, content)?;
        restrict_permissions(&temp_path)?;
        Ok(temp_path)
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| ProvisionError::Store("secret store lock poisoned".to_string()))
    }
}

impl SecretStore for FileSecretStore {
    fn load(&self, scope: &ScopeId) -> Result<Option<StoredSecret>> {
        let path = self.scope_path(scope);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn get_or_create(&self, scope: &ScopeId, candidate: Secret) -> Result<(StoredSecret, bool)> {
        let _guard = self.guard()?;

        if let Some(existing) = self.load(scope)? {
            return Ok((existing, false));
        }

        let record = StoredSecret::new(scope.clone(), candidate);
        let temp_path = self.write_temp(scope, &record)?;
        let path = self.scope_path(scope);

        let linked = std::fs::hard_link(&temp_path, &path);
        std::fs::remove_file(&temp_path)?;

        match linked {
            Ok(()) => {
                debug!(scope = %scope, "Created secret file");
                Ok((record, true))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Another process won the race
                debug!(scope = %scope, "Secret file created concurrently, using existing");
                Ok((Self::read_record(&path)?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn rotate(&self, scope: &ScopeId, secret: Secret) -> Result<StoredSecret> {
        let _guard = self.guard()?;

        let record = match self.load(scope)? {
            Some(existing) => existing.rotated(secret),
            None => StoredSecret::new(scope.clone(), secret),
        };

        // Write to temp file first, then rename for atomicity
        let temp_path = self.write_temp(scope, &record)?;
        std::fs::rename(&temp_path, self.scope_path(scope))?;

        Ok(record)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
