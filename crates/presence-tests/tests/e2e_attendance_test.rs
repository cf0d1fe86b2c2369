//! End-to-end attendance tests
//!
//! A real server on a loopback port, a file-backed secret store, and the
//! terminal's HTTP client: the terminal fetches the secret and presents a
//! code, an employee submits it, the server accepts it.

use std::sync::Arc;
use std::time::Duration;

use presence_core::{Clock, CodeEngine, Role, ScopeId, SystemClock};
use presence_server::auth::{Identity, LockoutPolicy, SignedTokenVerifier, TOKEN_KEY_LEN};
use presence_server::http::{self, AppState, ROTATE_PATH, VERIFY_PATH};
use presence_server::{AttendanceVerifier, FileSecretStore, SecretProvisioner, SecretStore};
use presence_terminal::{
    ClientError, RefreshPolicy, RefreshTicker, SecretClient, SecretSource, TerminalSession,
};
use tempfile::TempDir;

struct TestServer {
    base_url: String,
    tokens: Arc<SignedTokenVerifier>,
    store: Arc<FileSecretStore>,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let tokens = Arc::new(SignedTokenVerifier::new([42u8; TOKEN_KEY_LEN]));
        let store = Arc::new(FileSecretStore::new(dir.path().join("secrets")).unwrap());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let state = AppState {
            provisioner: Arc::new(SecretProvisioner::new(
                tokens.clone(),
                store.clone(),
                Arc::clone(&clock),
            )),
            verifier: Arc::new(AttendanceVerifier::new(
                tokens.clone(),
                store.clone(),
                CodeEngine::default(),
                clock,
                LockoutPolicy::strict(),
            )),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(http::serve(listener, state));

        Self {
            base_url,
            tokens,
            store,
            _dir: dir,
        }
    }

    fn token(&self, subject: &str, scope: &str, role: Role) -> String {
        self.tokens
            .issue(&Identity {
                subject: subject.to_string(),
                scope: ScopeId::new(scope).unwrap(),
                role,
                expires_at: SystemClock.now_unix() + 3600,
            })
            .unwrap()
    }

    fn client(&self) -> SecretClient {
        SecretClient::with_settings(
            &self.base_url,
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .unwrap()
    }

    async fn submit(&self, token: &str, code: &str) -> (u16, serde_json::Value) {
        let response = reqwest::Client::new()
            .post(format!("{}{}", self.base_url, VERIFY_PATH))
            .header("auth", token)
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_terminal_code_accepted_by_server() {
    let server = TestServer::start().await;

    // ==========================================
    // STEP 1: Administrator signs in at the terminal
    // ==========================================
    let admin = server.token("reception", "acme", Role::Admin);
    let ticker = RefreshTicker::new(
        CodeEngine::default(),
        Arc::new(SystemClock),
        RefreshPolicy::StepAligned,
    );
    let mut session = TerminalSession::new(Arc::new(server.client()), admin, ticker);

    // ==========================================
    // STEP 2: Terminal shows the current code
    // ==========================================
    let codes = session.show_codes().await.unwrap();
    let shown = codes.borrow().clone();
    assert_eq!(shown.code.len(), 6);

    // ==========================================
    // STEP 3: Employee types the code in
    // ==========================================
    let employee = server.token("emp-17", "acme", Role::Employee);
    let (status, body) = server.submit(&employee, &shown.code).await;
    assert_eq!(status, 200);
    assert_eq!(body["accepted"], true);

    // A wrong code is a normal rejection, not an error
    let wrong = if shown.code == "000000" { "111111" } else { "000000" };
    let (status, body) = server.submit(&employee, wrong).await;
    assert_eq!(status, 200);
    assert_eq!(body["accepted"], false);

    session.sign_out();
}

#[tokio::test]
async fn test_credential_failures() {
    let server = TestServer::start().await;
    let client = server.client();

    assert!(matches!(
        client.fetch_secret("").await,
        Err(ClientError::Authentication(_))
    ));

    let forged = SignedTokenVerifier::new([1u8; TOKEN_KEY_LEN])
        .issue(&Identity {
            subject: "mallory".to_string(),
            scope: ScopeId::new("acme").unwrap(),
            role: Role::Admin,
            expires_at: u64::MAX,
        })
        .unwrap();
    assert!(matches!(
        client.fetch_secret(&forged).await,
        Err(ClientError::Authentication(_))
    ));

    let employee = server.token("emp-1", "acme", Role::Employee);
    assert!(matches!(
        client.fetch_secret(&employee).await,
        Err(ClientError::Authorization(_))
    ));

    // No secret was provisioned by any of the failed calls
    assert!(server
        .store
        .load(&ScopeId::new("acme").unwrap())
        .unwrap()
        .is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_fetch_yields_one_secret() {
    let server = Arc::new(TestServer::start().await);
    let admin = server.token("reception", "globex", Role::Admin);

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let client = server.client();
            let admin = admin.clone();
            tokio::spawn(async move { client.fetch_secret(&admin).await.unwrap() })
        })
        .collect();

    let mut fetched = Vec::new();
    for handle in handles {
        fetched.push(handle.await.unwrap());
    }

    let first = &fetched[0].secret;
    assert!(fetched.iter().all(|f| &f.secret == first));
    assert!(fetched.iter().all(|f| f.generation == Some(1)));

    let stored = server
        .store
        .load(&ScopeId::new("globex").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(&stored.secret, first);
}

#[tokio::test]
async fn test_rotation_invalidates_old_codes() {
    let server = TestServer::start().await;
    let admin = server.token("reception", "acme", Role::Admin);
    let employee = server.token("emp-3", "acme", Role::Employee);
    let client = server.client();
    let engine = CodeEngine::default();

    let original = client.fetch_secret(&admin).await.unwrap();
    let old_code = engine.generate(&original.secret, SystemClock.now_unix()).code;

    let response = reqwest::Client::new()
        .post(format!("{}{}", server.base_url, ROTATE_PATH))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let rotated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(rotated["generation"], 2);

    let (_, body) = server.submit(&employee, &old_code).await;
    assert_eq!(body["accepted"], false);

    let current = client.fetch_secret(&admin).await.unwrap();
    assert_ne!(current.secret, original.secret);
    let new_code = engine.generate(&current.secret, SystemClock.now_unix()).code;
    let (_, body) = server.submit(&employee, &new_code).await;
    assert_eq!(body["accepted"], true);
}

#[tokio::test]
async fn test_repeated_rejections_lock_out_subject() {
    let server = TestServer::start().await;
    let admin = server.token("reception", "acme", Role::Admin);
    server.client().fetch_secret(&admin).await.unwrap();

    let employee = server.token("emp-9", "acme", Role::Employee);
    for _ in 0..3 {
        let (status, _) = server.submit(&employee, "not-a-code").await;
        assert_eq!(status, 200);
    }

    let (status, body) = server.submit(&employee, "not-a-code").await;
    assert_eq!(status, 429);
    assert_eq!(body["error"], "locked_out");
    assert!(body["retryAfterSecs"].as_u64().unwrap() > 0);

    // Other employees are unaffected
    let colleague = server.token("emp-10", "acme", Role::Employee);
    let (status, _) = server.submit(&colleague, "not-a-code").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_unprovisioned_scope_on_verify() {
    let server = TestServer::start().await;
    let employee = server.token("emp-1", "initech", Role::Employee);
    let (status, body) = server.submit(&employee, "123456").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not_provisioned");
}
