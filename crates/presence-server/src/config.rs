//! Server configuration

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use presence_core::CodeEngineConfig;

use crate::auth::{LockoutPolicy, TOKEN_KEY_LEN};
use crate::error::{ProvisionError, Result};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// Directory holding one secret file per scope
    pub secret_store_path: PathBuf,

    /// File holding the hex-encoded token signing key
    pub token_key_path: PathBuf,

    /// Code engine parameters shared with presenting terminals
    pub engine: CodeEngineConfig,

    /// Lockout applied to repeated rejected submissions
    pub lockout: LockoutPolicy,

    /// Lifetime of tokens minted by `presence-server issue-token` (seconds)
    pub token_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = Self::default_data_dir();
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            secret_store_path: data_dir.join("secrets"),
            token_key_path: data_dir.join("token.key"),
            engine: CodeEngineConfig::default(),
            lockout: LockoutPolicy::default(),
            token_ttl_secs: 12 * 3600,
        }
    }
}

impl ServerConfig {
    fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| {
                #[cfg(unix)]
                {
                    PathBuf::from("/var/lib")
                }
                #[cfg(windows)]
                {
                    PathBuf::from(r"C:\ProgramData")
                }
            })
            .join("presence")
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        std::env::var("PRESENCE_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("/etc"))
                    .join("presence")
                    .join("server.json")
            })
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path`, writing defaults there first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(path)?;
        info!("Created default config at {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.lockout.lockout_durations.is_empty() {
            return Err(ProvisionError::Config(
                "lockout.lockout_durations must not be empty".to_string(),
            ));
        }

        if self.token_ttl_secs == 0 {
            return Err(ProvisionError::Config(
                "token_ttl_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Create directories if they don't exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.secret_store_path)?;
        if let Some(parent) = self.token_key_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Read the token signing key, generating one on first run
    pub fn load_or_create_token_key(&self) -> Result<[u8; TOKEN_KEY_LEN]> {
        let mut key = [0u8; TOKEN_KEY_LEN];

        if self.token_key_path.exists() {
            let content = std::fs::read_to_string(&self.token_key_path)?;
            hex::decode_to_slice(content.trim(), &mut key).map_err(|e| {
                ProvisionError::Config(format!(
                    "token key at {:?} is not {} hex bytes: {}",
                    self.token_key_path, TOKEN_KEY_LEN, e
                ))
            })?;
            return Ok(key);
        }

        OsRng.fill_bytes(&mut key);
        std::fs::write(&self.token_key_path, hex::encode(key))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &self.token_key_path,
                std::fs::Permissions::from_mode(0o600),
            )?;
        }
        info!("Generated token signing key at {:?}", self.token_key_path);
        Ok(key)
    }
}
