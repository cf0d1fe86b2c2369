//! HTTP API
//!
//! - `GET  /health`
//! - `GET  /codeAuthentication/secrettotp`: scope secret, provisioned on first use
//! - `POST /codeAuthentication/secrettotp/rotate`: replace the scope secret
//! - `POST /codeAuthentication/verify`: check a submitted code

mod handlers;
mod types;

pub use handlers::{presented_token, AUTH_HEADER};
pub use types::{ApiError, ErrorBody, SecretResponse, VerifyRequest, VerifyResponse};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::provisioner::SecretProvisioner;
use crate::verifier::AttendanceVerifier;

pub const SECRET_PATH: &str = "/codeAuthentication/secrettotp";
pub const ROTATE_PATH: &str = "/codeAuthentication/secrettotp/rotate";
pub const VERIFY_PATH: &str = "/codeAuthentication/verify";

#[derive(Clone)]
pub struct AppState {
    pub provisioner: Arc<SecretProvisioner>,
    pub verifier: Arc<AttendanceVerifier>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(SECRET_PATH, get(handlers::get_secret))
        .route(ROTATE_PATH, post(handlers::rotate_secret))
        .route(VERIFY_PATH, post(handlers::verify_code))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on an already bound listener until the task is dropped
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).await
}
