//! Route handlers

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};

use super::types::{ApiError, SecretResponse, VerifyRequest, VerifyResponse};
use super::AppState;
use crate::error::ProvisionError;

/// Header the browser terminal sends the identity token in
pub const AUTH_HEADER: &str = "auth";

/// Credential from the `auth` header, falling back to `Authorization: Bearer`
///
/// A missing credential comes back empty and is rejected by the verifier.
pub fn presented_token(headers: &HeaderMap) -> String {
    if let Some(token) = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok()) {
        return token.trim().to_string();
    }

    // Auth schemes are case-insensitive (RFC 7235)
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim().to_string())
        .unwrap_or_default()
}

// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run a store-touching call on the blocking pool
///
/// The file store does synchronous I/O under a mutex, which must not stall
/// the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(ProvisionError::Worker(e.to_string())))?
        .map_err(ApiError)
}

// Fetch (provisioning on first use) the caller's scope secret
pub async fn get_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SecretResponse>, ApiError> {
    let token = presented_token(&headers);
    let provisioned = run_blocking(move || state.provisioner.get_secret(&token)).await?;
    Ok(Json(provisioned.into()))
}

// Replace the caller's scope secret
pub async fn rotate_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SecretResponse>, ApiError> {
    let token = presented_token(&headers);
    let provisioned = run_blocking(move || state.provisioner.rotate_secret(&token)).await?;
    Ok(Json(provisioned.into()))
}

// Check a code typed in by an employee
pub async fn verify_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let token = presented_token(&headers);
    let submission = run_blocking(move || state.verifier.submit(&token, &request.code)).await?;
    Ok(Json(submission.into()))
}
