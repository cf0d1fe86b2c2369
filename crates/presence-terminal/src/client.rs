//! HTTP client for the secret endpoint

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use presence_core::Secret;

use crate::error::{ClientError, Result};

/// Path of the secret endpoint relative to the server base URL
pub const SECRET_PATH: &str = "/codeAuthentication/secrettotp";

/// Default per-request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default pause before retrying a transient failure (milliseconds)
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Secret as returned by the server
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSecret {
    pub secret: Secret,
    /// Rotation generation, when the server reports one
    pub generation: Option<u32>,
}

/// Anything that can hand the terminal its scope secret
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn fetch_secret(&self, token: &str) -> Result<FetchedSecret>;
}

#[derive(Debug, Deserialize)]
struct SecretBody {
    #[serde(rename = "secretTOTP")]
    secret_totp: String,
    #[serde(default)]
    generation: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Client for the provisioning server
#[derive(Debug, Clone)]
pub struct SecretClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry_backoff: Duration,
}

impl SecretClient {
    /// Create a client with the default timeout and backoff
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_settings(
            base_url,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        )
    }

    pub fn with_settings(base_url: &str, timeout: Duration, retry_backoff: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            retry_backoff,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else if e.is_decode() {
            ClientError::Protocol(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }

    async fn fetch_once(&self, token: &str) -> Result<FetchedSecret> {
        let url = format!("{}{}", self.base_url, SECRET_PATH);
        debug!("Fetching scope secret from {}", url);

        let response = self
            .http
            .get(&url)
            .header("auth", token)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.to_string());

            return Err(match status.as_u16() {
                401 => ClientError::Authentication(message),
                403 => ClientError::Authorization(message),
                // Request timeout and throttling are worth one more try
                408 | 429 => ClientError::Network(message),
                500..=599 => ClientError::Network(message),
                _ => ClientError::Protocol(format!("unexpected status {}: {}", status, message)),
            });
        }

        let body: SecretBody = response.json().await.map_err(|e| self.map_send_error(e))?;
        let secret = Secret::from_base32(&body.secret_totp)?;

        Ok(FetchedSecret {
            secret,
            generation: body.generation,
        })
    }
}

#[async_trait]
impl SecretSource for SecretClient {
    /// Fetch the secret, retrying a transient failure once after a backoff
    async fn fetch_secret(&self, token: &str) -> Result<FetchedSecret> {
        match self.fetch_once(token).await {
            Err(e) if e.is_transient() => {
                warn!("Secret fetch failed ({}), retrying in {:?}", e, self.retry_backoff);
                tokio::time::sleep(self.retry_backoff).await;
                self.fetch_once(token).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn quick_client(base: &str) -> SecretClient {
        SecretClient::with_settings(base, Duration::from_millis(300), Duration::from_millis(10))
            .unwrap()
    }

    async fn echo_secret(headers: HeaderMap) -> impl IntoResponse {
        let auth = headers.get("auth").and_then(|v| v.to_str().ok()).unwrap_or("");
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if auth == "good" && bearer == "Bearer good" {
            (
                StatusCode::OK,
                Json(serde_json::json!({ "secretTOTP": "JBSWY3DPEHPK3PXP", "generation": 3 })),
            )
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "authentication", "message": "bad token" })),
            )
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_both_headers() {
        let base = spawn(Router::new().route(SECRET_PATH, get(echo_secret))).await;
        let fetched = quick_client(&base).fetch_secret("good").await.unwrap();
        assert_eq!(fetched.secret, Secret::from_base32("JBSWY3DPEHPK3PXP").unwrap());
        assert_eq!(fetched.generation, Some(3));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let base = spawn(Router::new().route(SECRET_PATH, get(echo_secret))).await;
        let err = quick_client(&base).fetch_secret("bad").await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(ref m) if m == "bad token"));
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_authorization() {
        let router = Router::new().route(
            SECRET_PATH,
            get(|| async { (StatusCode::FORBIDDEN, Json(serde_json::json!({ "message": "employee" }))) }),
        );
        let base = spawn(router).await;
        assert!(matches!(
            quick_client(&base).fetch_secret("t").await,
            Err(ClientError::Authorization(_))
        ));
    }

    /// Fails the first request with `status`, then serves the secret
    fn flaky_router(status: StatusCode, calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                SECRET_PATH,
                get(move |State(calls): State<Arc<AtomicUsize>>| async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        (status, Json(serde_json::json!({})))
                    } else {
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({ "secretTOTP": "JBSWY3DPEHPK3PXP" })),
                        )
                    }
                }),
            )
            .with_state(calls)
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = spawn(flaky_router(StatusCode::SERVICE_UNAVAILABLE, calls.clone())).await;

        let fetched = quick_client(&base).fetch_secret("t").await.unwrap();
        assert_eq!(fetched.generation, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_request_timeout_and_throttling_are_retried() {
        for status in [StatusCode::REQUEST_TIMEOUT, StatusCode::TOO_MANY_REQUESTS] {
            let calls = Arc::new(AtomicUsize::new(0));
            let base = spawn(flaky_router(status, calls.clone())).await;

            assert!(quick_client(&base).fetch_secret("t").await.is_ok(), "{}", status);
            assert_eq!(calls.load(Ordering::SeqCst), 2, "{}", status);
        }
    }

    #[tokio::test]
    async fn test_persistent_failure_gives_up_after_one_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                SECRET_PATH,
                get(|State(calls): State<Arc<AtomicUsize>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }),
            )
            .with_state(calls.clone());
        let base = spawn(router).await;

        let err = quick_client(&base).fetch_secret("t").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let router = Router::new().route(
            SECRET_PATH,
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let base = spawn(router).await;

        let err = quick_client(&base).fetch_secret("t").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(300)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = quick_client(&format!("http://{}", addr))
            .fetch_secret("t")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_error() {
        let router = Router::new().route(
            SECRET_PATH,
            get(|| async { Json(serde_json::json!({ "unexpected": true })) }),
        );
        let base = spawn(router).await;
        assert!(matches!(
            quick_client(&base).fetch_secret("t").await,
            Err(ClientError::Protocol(_))
        ));
    }
}
