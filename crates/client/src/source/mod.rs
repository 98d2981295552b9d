//! Data sources: where a service's requests are answered.
//!
//! A service is built with exactly one source and never branches on which
//! one it got. [`HttpSource`] talks to the backend; [`MockSource`] answers
//! from deterministic fixtures shaped exactly like the backend's wire JSON,
//! so the same mapping code runs in both modes.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::http::{ApiClient, ApiRequest, HttpError};

/// Answers backend requests.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Send a request and return the decoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` exactly as the transport would.
    async fn send(&self, request: ApiRequest) -> Result<Value, HttpError>;

    /// Short label for logs (`"http"`, `"mock"`).
    fn label(&self) -> &'static str;
}

/// Shared data source handle.
pub type SharedSource = Arc<dyn DataSource>;

/// Backend-backed source.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: ApiClient,
}

impl HttpSource {
    /// Wrap an API client.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Underlying API client.
    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn send(&self, request: ApiRequest) -> Result<Value, HttpError> {
        self.client.send(request).await
    }

    fn label(&self) -> &'static str {
        "http"
    }
}

/// Fixture-backed source.
///
/// Responses depend only on the request; the optional delay exists so
/// loading states can be observed and has no other effect.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    delay: Duration,
}

impl MockSource {
    /// A mock source answering immediately.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    /// A mock source answering after `delay`.
    #[must_use]
    pub const fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn send(&self, request: ApiRequest) -> Result<Value, HttpError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        debug!(method = %request.method, path = %request.path, "Serving mock response");
        fixtures::respond(&request)
    }

    fn label(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let source = MockSource::new();
        let a = source.send(ApiRequest::get("/fetchStore")).await.unwrap();
        let b = source.send(ApiRequest::get("/fetchStore")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_unknown_route_is_404() {
        let err = MockSource::new()
            .send(ApiRequest::get("/nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_mock_delay_is_applied() {
        let source = MockSource::with_delay(Duration::from_millis(30));
        let start = tokio::time::Instant::now();
        source.send(ApiRequest::get("/fetchOneClickCatalog")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
