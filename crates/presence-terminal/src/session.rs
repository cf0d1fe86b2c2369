//! Signed-in terminal session

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use presence_core::{GeneratedCode, Secret};

use crate::cache::SessionCache;
use crate::client::SecretSource;
use crate::error::Result;
use crate::ticker::RefreshTicker;

/// State held while an administrator is signed in at the terminal
pub struct TerminalSession {
    source: Arc<dyn SecretSource>,
    token: String,
    cache: SessionCache,
    ticker: RefreshTicker,
}

impl TerminalSession {
    pub fn new(source: Arc<dyn SecretSource>, token: String, ticker: RefreshTicker) -> Self {
        Self {
            source,
            token,
            cache: SessionCache::new(),
            ticker,
        }
    }

    /// Cached secret, fetching and caching it on first use
    pub async fn secret(&self) -> Result<Secret> {
        if let Some(secret) = self.cache.secret() {
            return Ok(secret);
        }
        self.refresh_secret().await
    }

    /// Fetch the secret again and replace the cached copy
    pub async fn refresh_secret(&self) -> Result<Secret> {
        let fetched = self.source.fetch_secret(&self.token).await?;
        info!(generation = ?fetched.generation, "Fetched scope secret");
        self.cache.store_secret(fetched.secret.clone());
        Ok(fetched.secret)
    }

    /// Start (or restart) the code display from the cached secret
    pub async fn show_codes(&mut self) -> Result<watch::Receiver<GeneratedCode>> {
        let secret = self.secret().await?;
        Ok(self.ticker.start(secret))
    }

    /// Refetch the secret, then restart the display with it
    pub async fn reload(&mut self) -> Result<watch::Receiver<GeneratedCode>> {
        let secret = self.refresh_secret().await?;
        Ok(self.ticker.start(secret))
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn is_showing(&self) -> bool {
        self.ticker.is_running()
    }

    /// Stop the display and forget the cached secret
    pub fn sign_out(&mut self) {
        self.ticker.stop();
        self.cache.clear();
        info!("Terminal signed out");
    }
}
