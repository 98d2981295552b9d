//! Test double wrapping the mock source.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::http::{ApiRequest, HttpError};
use crate::source::{DataSource, MockSource};

/// Answers like [`MockSource`] except for scripted failing paths, and
/// records every path it was asked for.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    mock: MockSource,
    failures: Vec<(&'static str, u16)>,
    calls: AtomicUsize,
    paths: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail requests whose path starts with `prefix` with `status`.
    pub fn failing(mut self, prefix: &'static str, status: u16) -> Self {
        self.failures.push((prefix, status));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn send(&self, request: ApiRequest) -> Result<Value, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(request.path.clone());
        }
        if let Some((_, status)) = self
            .failures
            .iter()
            .find(|(prefix, _)| request.path.starts_with(prefix))
        {
            return Err(HttpError::Status {
                status: *status,
                body: String::new(),
            });
        }
        self.mock.send(request).await
    }

    fn label(&self) -> &'static str {
        "scripted"
    }
}
