//! Integration tests for the JDP client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p jdp-integration-tests
//! ```
//!
//! No external service is needed: [`FakeBackend`] binds an axum server on
//! `127.0.0.1:0` and answers every route with the client's own fixtures,
//! so each test exercises the real HTTP path (bearer injection, status
//! mapping, 401 handling) end to end.
//!
//! Individual routes can be overridden with a canned reply or slowed down
//! to provoke failures and races.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use jdp_client::clock::SystemClock;
use jdp_client::http::{ApiRequest, HttpError};
use jdp_client::source::{DataSource, MockSource};
use jdp_client::storage::{KeyValueStore, MemoryStore};
use jdp_client::{AppState, ClientConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use url::Url;

// =============================================================================
// Recorded traffic
// =============================================================================

/// A request as received by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Raw `Authorization` header.
    pub authorization: Option<String>,
    /// Raw body (JSON or form-encoded).
    pub body: String,
}

impl RecordedRequest {
    /// Bearer token, when one was sent.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.authorization.as_deref()?.strip_prefix("Bearer ")
    }

    /// Value of a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// Overrides
// =============================================================================

#[derive(Debug, Clone)]
struct Rule {
    method: Method,
    /// Exact path, or a prefix when it ends with `*`.
    path: String,
    query: Option<(String, String)>,
    delay: Duration,
    reply: Option<(StatusCode, Value)>,
}

impl Rule {
    fn matches(&self, method: &Method, path: &str, query: &[(String, String)]) -> bool {
        if &self.method != method {
            return false;
        }
        let path_ok = match self.path.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => self.path == path,
        };
        path_ok
            && self
                .query
                .as_ref()
                .is_none_or(|(k, v)| query.iter().any(|(qk, qv)| qk == k && qv == v))
    }
}

#[derive(Default)]
struct Shared {
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

// =============================================================================
// FakeBackend
// =============================================================================

/// Local HTTP server standing in for the JDP backend and the payment
/// provider.
pub struct FakeBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
    server: tokio::task::JoinHandle<()>,
}

impl FakeBackend {
    /// Bind on an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Fake backend has no address");
        let shared = Arc::new(Shared::default());

        let app = Router::new().fallback(handle).with_state(shared.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake backend stopped");
            }
        });

        Self { addr, shared, server }
    }

    /// Base URL of the server.
    ///
    /// # Panics
    ///
    /// Never in practice: the address is a bound socket.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("Socket address is a valid URL")
    }

    /// Configuration with every area pointed at this server, payments
    /// included.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::for_backend(self.url(), ".jdp-integration");
        config.stripe_api_base = self.url().as_str().trim_end_matches('/').to_string();
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// Application state over in-memory storage, returned with that storage.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is rejected.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn state(&self) -> (AppState, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let shared: Arc<dyn KeyValueStore> = storage.clone();
        let state = AppState::with_parts(self.config(), shared, Arc::new(SystemClock))
            .expect("Fake backend configuration is valid");
        (state, storage)
    }

    /// Answer `method path` with `status` and `body` instead of the fixture.
    /// A path ending in `*` matches as a prefix.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.push(Rule {
            method,
            path: path.to_string(),
            query: None,
            delay: Duration::ZERO,
            reply: Some((StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), body)),
        });
    }

    /// Hold `GET path?key=value` for `delay` before answering normally.
    pub fn delay(&self, path: &str, query: (&str, &str), delay: Duration) {
        self.push(Rule {
            method: Method::GET,
            path: path.to_string(),
            query: Some((query.0.to_string(), query.1.to_string())),
            delay,
            reply: None,
        });
    }

    /// Drop every override.
    pub fn reset_rules(&self) {
        self.shared
            .rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    fn push(&self, rule: Rule) {
        // Newest rule wins.
        self.shared
            .rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, rule);
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let query: Vec<(String, String)> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let raw_body = String::from_utf8_lossy(&body).into_owned();

    shared
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            query: query.clone(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
            body: raw_body.clone(),
        });

    let rule = shared
        .rules
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .find(|r| r.matches(&method, &path, &query))
        .cloned();

    if let Some(rule) = &rule
        && !rule.delay.is_zero()
    {
        tokio::time::sleep(rule.delay).await;
    }
    if let Some((status, body)) = rule.and_then(|r| r.reply) {
        return (status, axum::Json(body)).into_response();
    }

    // The chart endpoint is served under `/charts` when it has no host of its own.
    let fixture_path = match path.strip_prefix("/charts") {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path,
    };
    let mut request = ApiRequest::new(method, fixture_path);
    request.query = query;
    request.body = serde_json::from_str(&raw_body).ok();

    match MockSource::new().send(request).await {
        Ok(value) => axum::Json(value).into_response(),
        Err(HttpError::Status { status, body }) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
