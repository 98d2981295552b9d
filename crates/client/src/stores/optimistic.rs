//! Optimistic updates.

use std::future::Future;

/// Apply a local change, then attempt the remote call; invert the local
/// change if the call fails.
///
/// The local state reflects the change before the remote call starts, so
/// callers observe it immediately.
///
/// # Errors
///
/// Returns the remote failure after `invert` has run.
pub async fn apply<T, E, Fut>(
    forward: impl FnOnce(),
    remote: impl FnOnce() -> Fut,
    invert: impl FnOnce(&E),
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    forward();
    let result = remote().await;
    if let Err(e) = &result {
        invert(e);
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_success_keeps_change() {
        let value = &AtomicI32::new(0);
        let out = apply(
            || {
                value.fetch_add(1, Ordering::SeqCst);
            },
            || async { Ok::<_, ()>("ok") },
            |()| {
                value.fetch_sub(1, Ordering::SeqCst);
            },
        )
        .await;
        assert_eq!(out, Ok("ok"));
        assert_eq!(value.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_inverts_change() {
        let value = &AtomicI32::new(0);
        let seen_during_call = &AtomicI32::new(-1);
        let out: Result<(), &str> = apply(
            || {
                value.fetch_add(1, Ordering::SeqCst);
            },
            move || async move {
                seen_during_call.store(value.load(Ordering::SeqCst), Ordering::SeqCst);
                Err("boom")
            },
            |_| {
                value.fetch_sub(1, Ordering::SeqCst);
            },
        )
        .await;
        assert_eq!(out, Err("boom"));
        assert_eq!(seen_during_call.load(Ordering::SeqCst), 1);
        assert_eq!(value.load(Ordering::SeqCst), 0);
    }
}
