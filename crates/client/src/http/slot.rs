//! Last-request-wins coordination for a single resource.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use super::HttpError;

/// Supersession slot: starting a request cancels the one in flight.
///
/// A request that completes after being superseded reports
/// [`HttpError::Cancelled`] even if its response arrived, so a stale
/// response can never overwrite a newer one.
#[derive(Debug)]
pub struct RequestSlot {
    name: &'static str,
    state: Mutex<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
}

impl RequestSlot {
    /// Create an idle slot.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Run `fut` as the current request for this slot.
    ///
    /// # Errors
    ///
    /// Returns the future's error, [`HttpError::Timeout`] if it outlives
    /// `timeout`, or [`HttpError::Cancelled`] when superseded.
    pub async fn run<T, F>(&self, timeout: Duration, fut: F) -> Result<T, HttpError>
    where
        F: Future<Output = Result<T, HttpError>>,
    {
        let (tx, rx) = oneshot::channel();
        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = state.cancel.take() {
                debug!(slot = self.name, "Superseding in-flight request");
                let _ = previous.send(());
            }
            state.generation += 1;
            state.cancel = Some(tx);
            state.generation
        };

        let result = tokio::select! {
            res = tokio::time::timeout(timeout, fut) => res.unwrap_or(Err(HttpError::Timeout(timeout))),
            _ = rx => Err(HttpError::Cancelled),
        };

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            return Err(HttpError::Cancelled);
        }
        state.cancel = None;
        result
    }

    /// Cancel whatever is in flight.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        if let Some(previous) = state.cancel.take() {
            let _ = previous.send(());
        }
    }

    /// Whether a request is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_single_request_completes() {
        let slot = RequestSlot::new("test");
        let out = slot.run(LONG, async { Ok::<_, HttpError>(7) }).await;
        assert!(matches!(out, Ok(7)));
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_older() {
        let slot = RequestSlot::new("test");
        let slow = slot.run(LONG, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, HttpError>("old")
        });
        let fast = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            slot.run(LONG, async { Ok::<_, HttpError>("new") }).await
        };
        let (old, new) = tokio::join!(slow, fast);
        assert!(matches!(old, Err(HttpError::Cancelled)));
        assert!(matches!(new, Ok("new")));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let slot = RequestSlot::new("test");
        let out = slot
            .run(Duration::from_millis(10), async {
                tokio::time::sleep(LONG).await;
                Ok::<_, HttpError>(())
            })
            .await;
        assert!(matches!(out, Err(HttpError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_explicit_cancel() {
        let slot = RequestSlot::new("test");
        let pending = slot.run(LONG, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, HttpError>(())
        });
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            slot.cancel();
        };
        let (out, ()) = tokio::join!(pending, cancel);
        assert!(matches!(out, Err(HttpError::Cancelled)));
    }
}
