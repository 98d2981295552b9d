//! One-click basket.
//!
//! Holds at most one subscription plan. Selecting a plan always starts a
//! fresh backend basket: whatever was selected before is discarded, never
//! merged. Plan prices are TTC only; totals derive HT from the VAT rate.

use std::sync::Arc;

use jdp_core::{AddressId, BasketCode, CartTotals, OneClickBasket, OneClickBasketItem, PlanId};
use tracing::{info, instrument};

use super::notifications::Notifications;
use super::resource::{FetchOutcome, LoadState, Resource};
use crate::clock::SharedClock;
use crate::services::{OneClickReceipt, SubscriptionError, SubscriptionService};

/// The one-click basket. Clones share state.
#[derive(Debug, Clone)]
pub struct OneClickStore {
    inner: Arc<OneClickStoreInner>,
}

#[derive(Debug)]
struct OneClickStoreInner {
    service: SubscriptionService,
    notifications: Notifications,
    basket: Resource<OneClickBasket, SubscriptionError>,
}

impl OneClickStore {
    #[must_use]
    pub fn new(service: SubscriptionService, notifications: Notifications, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(OneClickStoreInner {
                service,
                notifications,
                basket: Resource::memory("oneclick", None, clock),
            }),
        }
    }

    /// Select a plan, replacing any previous selection.
    ///
    /// # Errors
    ///
    /// Returns the service failure; the previous basket is kept and an
    /// error notification is raised.
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    pub async fn add_plan(&self, plan_id: &PlanId) -> Result<(), SubscriptionError> {
        let service = &self.inner.service;
        match self.inner.basket.fetch(true, || service.add_plan(plan_id)).await {
            Ok(FetchOutcome::Superseded) => Ok(()),
            Ok(_) => {
                let name = self.item().map(|i| i.name).unwrap_or_default();
                info!(basket_code = ?self.basket_code(), "Plan selected");
                self.inner
                    .notifications
                    .success(format!("Formule « {name} » ajoutée à votre panier."));
                Ok(())
            }
            Err(e) => {
                self.inner.notifications.error(e.message.clone());
                Err(e)
            }
        }
    }

    /// Remove the selected plan.
    ///
    /// # Errors
    ///
    /// `Validation` when nothing is selected, otherwise the service failure
    /// (with an error notification).
    #[instrument(skip(self))]
    pub async fn remove_plan(&self) -> Result<(), SubscriptionError> {
        let (Some(code), Some(item)) = (self.basket_code(), self.item()) else {
            return Err(SubscriptionError::validation("Aucune formule sélectionnée."));
        };
        let service = &self.inner.service;
        match self
            .inner
            .basket
            .fetch(true, || service.delete_plan(&code, &item.plan_id))
            .await
        {
            Ok(_) => {
                self.inner.notifications.info("Formule retirée du panier.");
                Ok(())
            }
            Err(e) => {
                self.inner.notifications.error(e.message.clone());
                Err(e)
            }
        }
    }

    /// Reload the basket identified by the current code.
    ///
    /// # Errors
    ///
    /// Returns the service failure.
    #[instrument(skip(self))]
    pub async fn fetch_basket(&self) -> Result<(), SubscriptionError> {
        let code = self.basket_code();
        let service = &self.inner.service;
        self.inner
            .basket
            .fetch(true, || service.fetch_basket(code.as_ref()))
            .await
            .map(drop)
    }

    #[must_use]
    pub fn basket(&self) -> OneClickBasket {
        self.inner.basket.data().unwrap_or_default()
    }

    #[must_use]
    pub fn item(&self) -> Option<OneClickBasketItem> {
        self.inner.basket.with(|b| b.item.clone()).flatten()
    }

    #[must_use]
    pub fn basket_code(&self) -> Option<BasketCode> {
        self.inner.basket.with(|b| b.code.clone()).flatten()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item().is_none()
    }

    /// TTC price of the plan with HT and VAT derived at the standard rate.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals::from_ttc(self.item().map(|i| i.price))
    }

    #[must_use]
    pub fn state(&self) -> LoadState<SubscriptionError> {
        self.inner.basket.state()
    }

    /// Finalise the subscription once the setup intent is confirmed, then
    /// forget the basket.
    ///
    /// # Errors
    ///
    /// `Validation` when no basket exists, otherwise the service failure;
    /// the basket is kept on failure.
    #[instrument(skip(self))]
    pub async fn finalize(&self, address_id: Option<&AddressId>) -> Result<OneClickReceipt, SubscriptionError> {
        let Some(code) = self.basket_code() else {
            return Err(SubscriptionError::validation("Aucune formule sélectionnée."));
        };
        let receipt = self.inner.service.checkout(&code, address_id).await?;
        info!(subscription_id = ?receipt.subscription_id, "Subscription finalised");
        self.reset();
        Ok(receipt)
    }

    /// Forget the basket after a confirmed subscription.
    pub fn reset(&self) {
        info!("Resetting one-click basket");
        self.inner.basket.reset();
    }
}
