use async_trait::async_trait;
use jdp_core::{BasketCode, CartTotals};
use tracing::{info, instrument};

use super::provider::PaymentProvider;
use super::{CheckoutError, CheckoutFlow, CheckoutKind, CheckoutLine, PaymentOutcome, normalize};
use crate::services::{PaymentService, PaymentSession};
use crate::stores::OneClickStore;

/// One-click subscription checkout: a setup intent, nothing charged now.
#[derive(Debug, Clone)]
pub struct OneClickCheckout {
    basket: OneClickStore,
    payments: PaymentService,
}

impl OneClickCheckout {
    #[must_use]
    pub const fn new(basket: OneClickStore, payments: PaymentService) -> Self {
        Self { basket, payments }
    }
}

#[async_trait]
impl CheckoutFlow for OneClickCheckout {
    fn kind(&self) -> CheckoutKind {
        CheckoutKind::OneClick
    }

    fn basket_code(&self) -> Option<BasketCode> {
        self.basket.basket_code()
    }

    fn is_empty(&self) -> bool {
        self.basket.is_empty()
    }

    fn lines(&self) -> Vec<CheckoutLine> {
        self.basket
            .item()
            .into_iter()
            .map(|item| CheckoutLine {
                label: item.name,
                quantity: 1,
                amount: item.price,
            })
            .collect()
    }

    fn totals(&self) -> CartTotals {
        self.basket.totals()
    }

    #[instrument(skip(self))]
    async fn init_payment(&self) -> Result<PaymentSession, CheckoutError> {
        let code = self
            .basket_code()
            .ok_or(CheckoutError::MissingBasketCode(CheckoutKind::OneClick))?;
        let session = self.payments.init_oneclick_payment(&code).await?;
        info!(basket_code = %code, "Setup intent created");
        Ok(session)
    }

    async fn confirm(
        &self,
        provider: &dyn PaymentProvider,
        session: &PaymentSession,
        payment_method: &str,
    ) -> PaymentOutcome {
        normalize(provider.confirm_card_setup(session, payment_method).await)
    }

    fn reset(&self) {
        self.basket.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use jdp_core::PlanId;

    use super::*;
    use crate::checkout::{Checkout, CheckoutStores, MockProvider, ProviderConfirmation};
    use crate::clock::ManualClock;
    use crate::services::{CartService, PaymentIntentKind, SubscriptionService};
    use crate::source::MockSource;
    use crate::storage::MemoryStore;
    use crate::stores::testing::ScriptedSource;
    use crate::stores::{CartStore, Notifications, cart_item_for};

    fn stores() -> CheckoutStores {
        let source = Arc::new(MockSource::new());
        let clock = Arc::new(ManualClock::at(0));
        CheckoutStores {
            cart: CartStore::new(Arc::new(MemoryStore::new()), clock.clone(), CartService::new(source.clone())),
            oneclick: OneClickStore::new(SubscriptionService::new(source), Notifications::new(), clock),
        }
    }

    #[tokio::test]
    async fn test_missing_basket_code_fails_before_any_call() {
        let source = Arc::new(ScriptedSource::new());
        let stores = stores();
        for kind in [CheckoutKind::Shop, CheckoutKind::OneClick] {
            let checkout = Checkout::new(kind, &stores, PaymentService::new(source.clone()));
            let err = checkout.init_payment().await.unwrap_err();
            assert_eq!(err, CheckoutError::MissingBasketCode(kind));
        }
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_oneclick_flow_uses_setup_intent() {
        let stores = stores();
        stores.oneclick.add_plan(&PlanId::new("premium")).await.unwrap();
        let checkout = Checkout::new(
            CheckoutKind::OneClick,
            &stores,
            PaymentService::new(Arc::new(MockSource::new())),
        );
        assert_eq!(checkout.lines().len(), 1);

        let session = checkout.init_payment().await.unwrap();
        assert_eq!(session.intent, PaymentIntentKind::Setup);
        // Creating the intent keeps the basket.
        assert!(!checkout.is_empty());

        let provider = MockProvider::new(ProviderConfirmation::status("requires_action"));
        let outcome = checkout.confirm(&provider, &session, "pm_card_visa").await;
        assert!(outcome.is_success());

        checkout.complete(false);
        assert!(!checkout.is_empty());
        checkout.complete(true);
        assert!(checkout.is_empty());
        assert!(checkout.basket_code().is_none());
    }

    #[tokio::test]
    async fn test_shop_flow_after_sync() {
        let stores = stores();
        let catalog = crate::services::ShopService::new(Arc::new(MockSource::new()), std::time::Duration::from_secs(5))
            .fetch_catalog()
            .await
            .unwrap();
        let napoleon = catalog.iter().find(|r| r.id.as_str() == "ref-napoleon-20f").unwrap();
        stores.cart.add(cart_item_for(napoleon).unwrap()).unwrap();
        stores.cart.sync().await.unwrap();

        let checkout = Checkout::new(CheckoutKind::Shop, &stores, PaymentService::new(Arc::new(MockSource::new())));
        let session = checkout.init_payment().await.unwrap();
        assert_eq!(session.intent, PaymentIntentKind::Payment);
        assert_eq!(checkout.totals(), stores.cart.totals());

        let declined = MockProvider::new(ProviderConfirmation::failed("Carte refusée."));
        let outcome = checkout.confirm(&declined, &session, "pm_card_declined").await;
        assert_eq!(
            outcome,
            PaymentOutcome::Failed {
                message: "Carte refusée.".to_string()
            }
        );
        assert_eq!(stores.cart.count(), 1);
    }
}
