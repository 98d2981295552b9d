//! Checkout orchestration.
//!
//! Two flows share one shape: the shop cart pays through a payment intent
//! and the one-click basket subscribes through a setup intent. The caller
//! picks the flow explicitly with [`CheckoutKind`]; nothing is inferred
//! from the current route.
//!
//! A basket is reset only once the caller reports the whole transaction as
//! confirmed ([`CheckoutFlow::complete`]), never when an intent is created.

mod oneclick;
mod provider;
mod shop;

use async_trait::async_trait;
use jdp_core::{BasketCode, CartTotals};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

pub use oneclick::OneClickCheckout;
pub use provider::{
    MockProvider, PaymentProvider, ProviderConfirmation, ProviderError, StripeProvider, parse_confirmation,
};
pub use shop::ShopCheckout;

use crate::services::{PaymentError, PaymentService, PaymentSession};
use crate::stores::{CartStore, OneClickStore};

/// Which basket is being paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutKind {
    Shop,
    OneClick,
}

impl CheckoutKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shop => "shop",
            Self::OneClick => "oneclick",
        }
    }
}

impl std::fmt::Display for CheckoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// No backend basket exists yet; nothing was sent.
    #[error("no basket code for {0} checkout")]
    MissingBasketCode(CheckoutKind),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// One line of the order summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub label: String,
    pub quantity: u32,
    /// TTC line total.
    pub amount: Decimal,
}

/// Normalised result of a card confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The provider accepted the card. `requires_action` and `processing`
    /// count as accepted; the provider's own UI finishes them.
    Accepted { status: String },
    Failed { message: String },
}

impl PaymentOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Map a raw provider answer to an outcome. A provider error always wins
/// over the status.
#[must_use]
pub fn normalize(confirmation: ProviderConfirmation) -> PaymentOutcome {
    if let Some(error) = confirmation.error {
        let message = error
            .message
            .or(error.code)
            .unwrap_or_else(|| "Le paiement a été refusé.".to_string());
        return PaymentOutcome::Failed { message };
    }
    match confirmation.status.as_deref() {
        Some(status @ ("succeeded" | "requires_action" | "processing")) => PaymentOutcome::Accepted {
            status: status.to_string(),
        },
        Some(other) => PaymentOutcome::Failed {
            message: format!("Paiement non abouti (statut « {other} »)."),
        },
        None => PaymentOutcome::Failed {
            message: "Paiement non abouti (statut inconnu).".to_string(),
        },
    }
}

/// A basket that can be paid for.
#[async_trait]
pub trait CheckoutFlow: Send + Sync {
    fn kind(&self) -> CheckoutKind;

    fn basket_code(&self) -> Option<BasketCode>;

    fn is_empty(&self) -> bool;

    fn lines(&self) -> Vec<CheckoutLine>;

    fn totals(&self) -> CartTotals;

    /// Create the provider intent for the current basket.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::MissingBasketCode`] before any backend call when no
    /// basket exists, otherwise the payment service failure.
    async fn init_payment(&self) -> Result<PaymentSession, CheckoutError>;

    /// Confirm the intent with a card payment method.
    async fn confirm(
        &self,
        provider: &dyn PaymentProvider,
        session: &PaymentSession,
        payment_method: &str,
    ) -> PaymentOutcome;

    /// Forget the basket.
    fn reset(&self);

    /// Report the end of the transaction. The basket is reset only when
    /// the caller confirms it went through.
    fn complete(&self, confirmed: bool) {
        if confirmed {
            info!(kind = %self.kind(), "Checkout complete, resetting basket");
            self.reset();
        } else {
            warn!(kind = %self.kind(), "Checkout not confirmed, keeping basket");
        }
    }
}

/// Stores a [`Checkout`] can be built from.
#[derive(Debug, Clone)]
pub struct CheckoutStores {
    pub cart: CartStore,
    pub oneclick: OneClickStore,
}

/// The flow selected for one checkout page.
#[derive(Debug, Clone)]
pub enum Checkout {
    Shop(ShopCheckout),
    OneClick(OneClickCheckout),
}

impl Checkout {
    #[must_use]
    pub fn new(kind: CheckoutKind, stores: &CheckoutStores, payments: PaymentService) -> Self {
        match kind {
            CheckoutKind::Shop => Self::Shop(ShopCheckout::new(stores.cart.clone(), payments)),
            CheckoutKind::OneClick => Self::OneClick(OneClickCheckout::new(stores.oneclick.clone(), payments)),
        }
    }

    fn flow(&self) -> &dyn CheckoutFlow {
        match self {
            Self::Shop(flow) => flow,
            Self::OneClick(flow) => flow,
        }
    }
}

#[async_trait]
impl CheckoutFlow for Checkout {
    fn kind(&self) -> CheckoutKind {
        self.flow().kind()
    }

    fn basket_code(&self) -> Option<BasketCode> {
        self.flow().basket_code()
    }

    fn is_empty(&self) -> bool {
        self.flow().is_empty()
    }

    fn lines(&self) -> Vec<CheckoutLine> {
        self.flow().lines()
    }

    fn totals(&self) -> CartTotals {
        self.flow().totals()
    }

    async fn init_payment(&self) -> Result<PaymentSession, CheckoutError> {
        self.flow().init_payment().await
    }

    async fn confirm(
        &self,
        provider: &dyn PaymentProvider,
        session: &PaymentSession,
        payment_method: &str,
    ) -> PaymentOutcome {
        self.flow().confirm(provider, session, payment_method).await
    }

    fn reset(&self) {
        self.flow().reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_statuses() {
        for status in ["succeeded", "requires_action", "processing"] {
            let outcome = normalize(ProviderConfirmation::status(status));
            assert!(outcome.is_success(), "{status} should be accepted");
        }
    }

    #[test]
    fn test_unknown_status_names_it() {
        let outcome = normalize(ProviderConfirmation::status("requires_capture"));
        let PaymentOutcome::Failed { message } = outcome else {
            panic!("expected failure");
        };
        assert!(message.contains("requires_capture"));
    }

    #[test]
    fn test_provider_error_wins() {
        let confirmation = ProviderConfirmation {
            status: Some("succeeded".to_string()),
            error: Some(ProviderError {
                code: Some("card_declined".to_string()),
                message: Some("Carte refusée.".to_string()),
            }),
        };
        assert_eq!(
            normalize(confirmation),
            PaymentOutcome::Failed {
                message: "Carte refusée.".to_string()
            }
        );
    }

    #[test]
    fn test_error_without_message_uses_code() {
        let confirmation = ProviderConfirmation {
            status: None,
            error: Some(ProviderError {
                code: Some("expired_card".to_string()),
                message: None,
            }),
        };
        assert_eq!(
            normalize(confirmation),
            PaymentOutcome::Failed {
                message: "expired_card".to_string()
            }
        );
    }
}
