//! HTTP client wrapper for the JDP backend.
//!
//! # Architecture
//!
//! - One [`ApiClient`] is built at startup and shared (`Clone` is an `Arc`
//!   bump); services never construct their own `reqwest::Client`.
//! - Every request carries the persisted bearer token when one exists and an
//!   `X-Request-Id` for log correlation.
//! - A 401 response clears the persisted auth state before the error is
//!   returned. The wrapper never redirects; guards do that.
//! - Errors are returned unclassified as [`HttpError`]; each service maps
//!   them into its own typed error.

mod slot;

pub use slot::RequestSlot;

use std::sync::Arc;
use std::time::Duration;

use jdp_core::ErrorCode;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::clock::{SharedClock, SystemClock};
use crate::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Maximum number of body characters kept in errors and logs.
const BODY_PREVIEW_CHARS: usize = 500;

// =============================================================================
// Errors
// =============================================================================

/// Transport-level failure.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request exceeded its timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A newer request for the same resource superseded this one.
    #[error("request cancelled")]
    Cancelled,

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body preview.
        body: String,
    },

    /// The body was not the JSON shape expected.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Path or base URL could not form a valid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// HTTP status, when the failure carried one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Machine-readable classification.
    ///
    /// For status errors the backend's own `code` (flat `{"code": ..}` or
    /// nested `{"error": {"code": ..}}`) wins over the status mapping.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(e) if e.is_timeout() => ErrorCode::Timeout,
            Self::Transport(e) if e.is_decode() => ErrorCode::InvalidResponse,
            Self::Transport(e) => e
                .status()
                .map_or(ErrorCode::Network, |s| ErrorCode::from_status(s.as_u16())),
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Status { status, body } => error_payload(body)
                .and_then(|(code, _)| code)
                .unwrap_or_else(|| ErrorCode::from_status(*status)),
            Self::Decode(_) => ErrorCode::InvalidResponse,
            Self::InvalidUrl(_) => ErrorCode::Unknown,
        }
    }

    /// Human-readable message, preferring the backend's `message`.
    #[must_use]
    pub fn message(&self) -> String {
        if let Self::Status { body, .. } = self
            && let Some((_, Some(message))) = error_payload(body)
        {
            return message;
        }
        self.to_string()
    }
}

/// Extract `(code, message)` from a flat or nested JSON error body.
fn error_payload(body: &str) -> Option<(Option<ErrorCode>, Option<String>)> {
    let value: Value = serde_json::from_str(body).ok()?;
    let node = match value.get("error") {
        Some(nested @ Value::Object(_)) => nested,
        _ => &value,
    };
    let code = node
        .get("code")
        .and_then(Value::as_str)
        .and_then(ErrorCode::from_wire);
    let message = node
        .get("message")
        .or_else(|| node.get("msg"))
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .map(ToString::to_string);
    Some((code, message))
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

// =============================================================================
// ApiRequest
// =============================================================================

/// A backend request, independent of the data source that serves it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL (`/fetchStore`).
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Build a request with no query and no body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `PATCH path`.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// String field of the JSON body.
    #[must_use]
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.as_ref()?.get(key)?.as_str()
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the JDP REST backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    storage: Arc<dyn KeyValueStore>,
    clock: SharedClock,
    timeout: Duration,
    attach_auth: bool,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .field("attach_auth", &self.inner.attach_auth)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a backend client that authenticates with the persisted token.
    #[must_use]
    pub fn new(base_url: Url, storage: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self::build(base_url, storage, Arc::new(SystemClock), timeout, true)
    }

    /// Create a client for a third-party endpoint: the bearer token is
    /// never sent and 401s do not touch the session.
    #[must_use]
    pub fn external(base_url: Url, storage: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self::build(base_url, storage, Arc::new(SystemClock), timeout, false)
    }

    /// Replace the clock used for token-expiry checks.
    #[must_use]
    pub fn with_clock(self, clock: SharedClock) -> Self {
        Self::build(
            self.inner.base_url.clone(),
            self.inner.storage.clone(),
            clock,
            self.inner.timeout,
            self.inner.attach_auth,
        )
    }

    fn build(
        base_url: Url,
        storage: Arc<dyn KeyValueStore>,
        clock: SharedClock,
        timeout: Duration,
        attach_auth: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url,
                storage,
                clock,
                timeout,
                attach_auth,
            }),
        }
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Configured per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// `GET` and decode.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` on transport failure, non-success status or an
    /// undecodable body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.execute(ApiRequest::get(path)).await
    }

    /// `POST` a JSON body and decode.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.execute(ApiRequest::post(path).json(serde_json::to_value(body)?))
            .await
    }

    /// `PUT` a JSON body and decode.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn put<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.execute(ApiRequest::put(path).json(serde_json::to_value(body)?))
            .await
    }

    /// `PATCH` a JSON body and decode.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn patch<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.execute(ApiRequest::patch(path).json(serde_json::to_value(body)?))
            .await
    }

    /// `DELETE` and decode.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.execute(ApiRequest::delete(path)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, HttpError> {
        let value = self.send(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a request and return the decoded JSON body (`Null` when empty).
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<Value, HttpError> {
        let url = self.resolve(&request)?;
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), url)
            .timeout(self.inner.timeout)
            .header("Accept", "application/json")
            .header("X-Request-Id", &request_id);

        if let Some(token) = self.current_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.inner.timeout)
            } else {
                HttpError::Transport(e)
            }
        })?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            if self.inner.attach_auth {
                warn!(request_id, "Backend returned 401, clearing persisted session");
                for key in keys::AUTH_KEYS {
                    self.inner.storage.remove_logged(key);
                }
            }
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: preview(&text),
            });
        }

        if !status.is_success() {
            error!(
                status = %status,
                request_id,
                body = %preview(&text),
                "Backend returned non-success status"
            );
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: preview(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            error!(
                error = %e,
                request_id,
                body = %preview(&text),
                "Failed to parse backend response"
            );
            HttpError::Decode(e)
        })
    }

    /// Persisted bearer token, unless absent or past its expiry.
    fn current_token(&self) -> Option<String> {
        if !self.inner.attach_auth {
            return None;
        }
        let token = self.inner.storage.get(keys::AUTH_TOKEN).ok().flatten()?;
        let expires_at: Option<i64> = self.inner.storage.get_json(keys::AUTH_TOKEN_EXPIRES_AT);
        if let Some(expires_at) = expires_at
            && self.inner.clock.now_millis() >= expires_at
        {
            debug!("Persisted token expired, sending request anonymously");
            return None;
        }
        let token = token.trim().trim_matches('"').to_string();
        (!token.is_empty()).then_some(token)
    }

    fn resolve(&self, request: &ApiRequest) -> Result<Url, HttpError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let path = request.path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        };
        let mut url = Url::parse(&joined).map_err(|e| HttpError::InvalidUrl(format!("{joined}: {e}")))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &request.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}
