//! Presence terminal
//!
//! Runs at the entrance while an administrator is signed in. Fetches the
//! organization's shared secret once per session, then shows the current
//! code (as digits and as a QR code) and refreshes it as steps roll over.

pub mod cache;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod session;
pub mod ticker;

pub use cache::SessionCache;
pub use client::{FetchedSecret, SecretClient, SecretSource};
pub use config::TerminalConfig;
pub use error::{ClientError, Result};
pub use session::TerminalSession;
pub use ticker::{RefreshPolicy, RefreshTicker};
