// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end session tests.
//!
//! [`FakeBackend`] is an in-process portal API on a random local port with
//! the `/auth/*` contract and one protected resource. Its knobs let a test
//! expire tokens, slow down or reject refreshes, and hold 401s until a
//! batch of requests has arrived. [`PortalCli`] runs the real
//! `portal-session` binary against it with an isolated state dir.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Barrier;

/// Account the fake backend accepts.
pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";
pub const USER_ID: u64 = 7;

/// Lifetime the fake backend reports for access tokens.
pub const ACCESS_TTL_SECS: u64 = 900;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

struct Tokens {
    access: String,
    refresh: String,
}

struct BackendState {
    tokens: Mutex<Option<Tokens>>,
    serial: AtomicU64,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    locked_calls: AtomicUsize,
    resource_bearers: Mutex<Vec<Option<String>>>,
    refresh_delay_ms: AtomicU64,
    reject_refresh: AtomicBool,
    rotate_refresh: AtomicBool,
    unauthorized_gate: Mutex<Option<Arc<Barrier>>>,
}

impl BackendState {
    fn next_token(&self, kind: &str) -> String {
        let n = self.serial.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{kind}-{n}")
    }

    fn is_current_access(&self, bearer: Option<&str>) -> bool {
        match (bearer, self.tokens.lock().as_ref()) {
            (Some(b), Some(t)) => b == t.access,
            _ => false,
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn user() -> Value {
    json!({ "id": USER_ID, "email": EMAIL, "name": "Ada Lovelace", "role": "editor" })
}

fn unauthorized(detail: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
}

async fn login(State(s): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    s.login_calls.fetch_add(1, Ordering::Relaxed);
    let email = body.get("email").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    if email != Some(EMAIL) || password != Some(PASSWORD) {
        return unauthorized("invalid credentials");
    }
    let access = s.next_token("access");
    let refresh = s.next_token("refresh");
    *s.tokens.lock() = Some(Tokens { access: access.clone(), refresh: refresh.clone() });
    Json(json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": ACCESS_TTL_SECS,
        "user": user(),
    }))
    .into_response()
}

async fn refresh(State(s): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    s.refresh_calls.fetch_add(1, Ordering::Relaxed);
    let delay = s.refresh_delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if s.reject_refresh.load(Ordering::Relaxed) {
        return unauthorized("refresh token revoked");
    }

    let presented = body.get("refresh_token").and_then(Value::as_str).unwrap_or_default();
    let mut tokens = s.tokens.lock();
    let Some(current) = tokens.as_mut() else {
        return unauthorized("no session");
    };
    if presented != current.refresh {
        return unauthorized("unknown refresh token");
    }

    current.access = s.next_token("access");
    let mut data = json!({ "access_token": current.access, "expires_in": ACCESS_TTL_SECS });
    if s.rotate_refresh.load(Ordering::Relaxed) {
        current.refresh = s.next_token("refresh");
        data["refresh_token"] = json!(current.refresh);
    }
    Json(json!({ "data": data })).into_response()
}

async fn me(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !s.is_current_access(bearer(&headers).as_deref()) {
        return unauthorized("token expired");
    }
    Json(json!({ "data": user() })).into_response()
}

async fn logout(State(s): State<Arc<BackendState>>) -> Response {
    s.logout_calls.fetch_add(1, Ordering::Relaxed);
    *s.tokens.lock() = None;
    StatusCode::NO_CONTENT.into_response()
}

async fn articles(State(s): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let presented = bearer(&headers);
    s.resource_bearers.lock().push(presented.clone());

    if s.is_current_access(presented.as_deref()) {
        return Json(json!({
            "items": [{ "id": 1, "title": "On the Analytical Engine" }],
            "served_with": presented,
        }))
        .into_response();
    }

    let gate = s.unauthorized_gate.lock().clone();
    if let Some(gate) = gate {
        if gate.wait().await.is_leader() {
            *s.unauthorized_gate.lock() = None;
        }
    }
    unauthorized("token expired")
}

async fn locked(State(s): State<Arc<BackendState>>) -> Response {
    s.locked_calls.fetch_add(1, Ordering::Relaxed);
    unauthorized("never allowed")
}

/// In-process portal API bound to `127.0.0.1:0`.
///
/// Lives as long as the test runtime; the server task is dropped with it.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
}

impl FakeBackend {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(BackendState {
            tokens: Mutex::new(None),
            serial: AtomicU64::new(0),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            locked_calls: AtomicUsize::new(0),
            resource_bearers: Mutex::new(Vec::new()),
            refresh_delay_ms: AtomicU64::new(0),
            reject_refresh: AtomicBool::new(false),
            rotate_refresh: AtomicBool::new(true),
            unauthorized_gate: Mutex::new(None),
        });

        let router = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/me", get(me))
            .route("/api/auth/logout", post(logout))
            .route("/api/articles", get(articles))
            .route("/api/locked", get(locked))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state })
    }

    /// API base URL, including the `/api` prefix.
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::Relaxed)
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::Relaxed)
    }

    pub fn logout_calls(&self) -> usize {
        self.state.logout_calls.load(Ordering::Relaxed)
    }

    /// Hits on `/locked`, which answers 401 no matter what.
    pub fn locked_calls(&self) -> usize {
        self.state.locked_calls.load(Ordering::Relaxed)
    }

    /// Bearer tokens presented to `/articles`, in arrival order.
    pub fn resource_bearers(&self) -> Vec<Option<String>> {
        self.state.resource_bearers.lock().clone()
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.state.tokens.lock().as_ref().map(|t| t.access.clone())
    }

    pub fn current_refresh_token(&self) -> Option<String> {
        self.state.tokens.lock().as_ref().map(|t| t.refresh.clone())
    }

    /// Invalidate the issued access token. The refresh token stays valid.
    pub fn expire_access_token(&self) {
        let next = self.state.next_token("access");
        if let Some(t) = self.state.tokens.lock().as_mut() {
            t.access = next;
        }
    }

    /// Forget the session server-side. Every token is rejected afterwards.
    pub fn revoke_session(&self) {
        *self.state.tokens.lock() = None;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_reject_refresh(&self, reject: bool) {
        self.state.reject_refresh.store(reject, Ordering::Relaxed);
    }

    /// When false, refresh responses omit `refresh_token`.
    pub fn set_rotate_refresh(&self, rotate: bool) {
        self.state.rotate_refresh.store(rotate, Ordering::Relaxed);
    }

    /// Hold `/articles` 401s until `n` of them are pending, then release
    /// them together. The gate clears itself after one batch.
    pub fn gate_unauthorized(&self, n: usize) {
        *self.state.unauthorized_gate.lock() = Some(Arc::new(Barrier::new(n)));
    }
}

/// Runs the `portal-session` binary with its own state dir.
pub struct PortalCli {
    binary: PathBuf,
    api_url: String,
    state_dir: tempfile::TempDir,
}

impl PortalCli {
    pub fn new(binary: impl Into<PathBuf>, api_url: impl Into<String>) -> anyhow::Result<Self> {
        let binary = binary.into();
        anyhow::ensure!(binary.exists(), "portal-session binary not found at {}", binary.display());
        Ok(Self { binary, api_url: api_url.into(), state_dir: tempfile::tempdir()? })
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn session_file(&self) -> PathBuf {
        self.state_dir.path().join("session.json")
    }

    /// Run one subcommand to completion.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<Output> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .env("PORTAL_API_URL", &self.api_url)
            .env("PORTAL_SESSION_STATE_DIR", self.state_dir.path())
            .env("PORTAL_LOG_LEVEL", "debug")
            .env_remove("PORTAL_EMAIL")
            .env_remove("PORTAL_PASSWORD")
            .stdin(Stdio::null())
            .output();
        Ok(tokio::time::timeout(Duration::from_secs(30), output).await??)
    }

    /// Log in with the account the fake backend accepts.
    pub async fn login(&self) -> anyhow::Result<Output> {
        self.run(&["login", "--email", EMAIL, "--password", PASSWORD]).await
    }
}

/// Stdout of a finished command as a string.
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr of a finished command as a string.
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
