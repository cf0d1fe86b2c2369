//! Terminal configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use presence_core::CodeEngineConfig;

use crate::client::{DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TIMEOUT_SECS};
use crate::error::{ClientError, Result};
use crate::ticker::RefreshPolicy;

/// Terminal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Base URL of the provisioning server
    pub server_url: String,

    /// Per-request timeout for the secret fetch (seconds)
    pub request_timeout_secs: u64,

    /// Pause before retrying a transient fetch failure (milliseconds)
    pub retry_backoff_ms: u64,

    /// Fixed redraw interval in seconds; 0 redraws at step boundaries
    pub refresh_interval_secs: u64,

    /// Must match the server's engine settings
    pub engine: CodeEngineConfig,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            refresh_interval_secs: 0,
            engine: CodeEngineConfig::default(),
        }
    }
}

impl TerminalConfig {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        std::env::var("PRESENCE_TERMINAL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("presence")
                    .join("terminal.json")
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

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "server_url must be an http(s) URL, got '{}'",
                self.server_url
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(ClientError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        match self.refresh_interval_secs {
            0 => RefreshPolicy::StepAligned,
            secs => RefreshPolicy::Fixed(Duration::from_secs(secs)),
        }
    }
}
