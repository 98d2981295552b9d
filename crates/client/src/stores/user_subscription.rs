//! The signed-in user's subscription.

use std::sync::Arc;

use jdp_core::UserSubscription;
use tracing::{info, instrument};

use super::resource::{FetchOutcome, LoadState, Resource};
use crate::clock::SharedClock;
use crate::services::{UserSubscriptionError, UserSubscriptionService};

/// Current subscription, if any. Clones share state.
#[derive(Debug, Clone)]
pub struct UserSubscriptionStore {
    inner: Arc<UserSubscriptionInner>,
}

#[derive(Debug)]
struct UserSubscriptionInner {
    service: UserSubscriptionService,
    subscription: Resource<Option<UserSubscription>, UserSubscriptionError>,
}

impl UserSubscriptionStore {
    #[must_use]
    pub fn new(service: UserSubscriptionService, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(UserSubscriptionInner {
                service,
                subscription: Resource::memory("user_subscription", None, clock),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns the service failure.
    #[instrument(skip(self))]
    pub async fn fetch(&self, force: bool) -> Result<FetchOutcome, UserSubscriptionError> {
        let service = &self.inner.service;
        self.inner.subscription.fetch(force, || service.fetch()).await
    }

    /// # Errors
    ///
    /// Returns the service failure.
    pub async fn refresh(&self) -> Result<FetchOutcome, UserSubscriptionError> {
        self.fetch(true).await
    }

    /// Swap the renewal card, then reload so the new card shows.
    ///
    /// # Errors
    ///
    /// Returns the update or reload failure.
    #[instrument(skip(self, payment_method_id))]
    pub async fn update_payment_method(&self, payment_method_id: &str) -> Result<(), UserSubscriptionError> {
        self.inner.service.update_payment_method(payment_method_id).await?;
        info!("Renewal card updated");
        self.refresh().await.map(drop)
    }

    #[must_use]
    pub fn subscription(&self) -> Option<UserSubscription> {
        self.inner.subscription.data().flatten()
    }

    /// Whether the loaded subscription grants access.
    #[must_use]
    pub fn has_access(&self) -> bool {
        self.subscription().is_some_and(|s| s.grants_access())
    }

    #[must_use]
    pub fn state(&self) -> LoadState<UserSubscriptionError> {
        self.inner.subscription.state()
    }

    pub fn reset(&self) {
        self.inner.subscription.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jdp_core::ErrorCode;

    use super::*;
    use crate::clock::ManualClock;
    use crate::stores::testing::ScriptedSource;

    #[tokio::test]
    async fn test_fetch_and_access() {
        let store = UserSubscriptionStore::new(
            UserSubscriptionService::new(Arc::new(ScriptedSource::new())),
            Arc::new(ManualClock::at(0)),
        );
        assert!(!store.has_access());
        store.fetch(false).await.unwrap();
        assert!(store.has_access());
        assert_eq!(store.subscription().unwrap().plan_name, "Premium");
    }

    #[tokio::test]
    async fn test_payment_method_update_reloads() {
        let source = Arc::new(ScriptedSource::new());
        let store = UserSubscriptionStore::new(
            UserSubscriptionService::new(source.clone()),
            Arc::new(ManualClock::at(0)),
        );
        store.update_payment_method("pm_card_visa").await.unwrap();
        assert_eq!(source.paths(), ["/updateOneClickPayment", "/fetchUserSubscription"]);

        let err = store.update_payment_method(" ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let store = UserSubscriptionStore::new(
            UserSubscriptionService::new(Arc::new(ScriptedSource::new().failing("/fetchUserSubscription", 401))),
            Arc::new(ManualClock::at(0)),
        );
        assert!(store.fetch(false).await.is_err());
        assert!(matches!(store.state(), LoadState::Failed(e) if e.code == ErrorCode::AuthRequired));
    }
}
