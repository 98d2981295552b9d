use async_trait::async_trait;
use jdp_core::{BasketCode, CartTotals};
use tracing::{info, instrument};

use super::provider::PaymentProvider;
use super::{CheckoutError, CheckoutFlow, CheckoutKind, CheckoutLine, PaymentOutcome, normalize};
use crate::services::{PaymentService, PaymentSession};
use crate::stores::CartStore;

/// Shop cart checkout: a payment intent charged on confirmation.
#[derive(Debug, Clone)]
pub struct ShopCheckout {
    cart: CartStore,
    payments: PaymentService,
}

impl ShopCheckout {
    #[must_use]
    pub const fn new(cart: CartStore, payments: PaymentService) -> Self {
        Self { cart, payments }
    }
}

#[async_trait]
impl CheckoutFlow for ShopCheckout {
    fn kind(&self) -> CheckoutKind {
        CheckoutKind::Shop
    }

    fn basket_code(&self) -> Option<BasketCode> {
        self.cart.basket_code()
    }

    fn is_empty(&self) -> bool {
        self.cart.is_empty()
    }

    fn lines(&self) -> Vec<CheckoutLine> {
        self.cart
            .items()
            .into_iter()
            .map(|item| CheckoutLine {
                label: item.name,
                quantity: 1,
                amount: item.price,
            })
            .collect()
    }

    fn totals(&self) -> CartTotals {
        self.cart.totals()
    }

    #[instrument(skip(self))]
    async fn init_payment(&self) -> Result<PaymentSession, CheckoutError> {
        let code = self
            .basket_code()
            .ok_or(CheckoutError::MissingBasketCode(CheckoutKind::Shop))?;
        let session = self.payments.init_payment(&code).await?;
        info!(basket_code = %code, "Payment intent created");
        Ok(session)
    }

    async fn confirm(
        &self,
        provider: &dyn PaymentProvider,
        session: &PaymentSession,
        payment_method: &str,
    ) -> PaymentOutcome {
        normalize(provider.confirm_card_payment(session, payment_method).await)
    }

    fn reset(&self) {
        self.cart.reset();
    }
}
