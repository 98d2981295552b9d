//! The signed-in user's subscription.

use jdp_core::{SubscriptionId, SubscriptionStatus, UserSubscription};
use serde_json::{Value, json};
use tracing::instrument;

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(UserSubscriptionError, "user subscription");

/// Subscription account endpoints.
#[derive(Clone)]
pub struct UserSubscriptionService {
    source: SharedSource,
}

impl std::fmt::Debug for UserSubscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSubscriptionService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl UserSubscriptionService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Current subscription, `None` when the user has none.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Option<UserSubscription>, UserSubscriptionError> {
        let body = self.source.send(ApiRequest::get("/fetchUserSubscription")).await?;
        check_rejection(&body)?;
        Ok(wire::field(&body, &["subscription", "data"]).and_then(map_subscription))
    }

    /// Replace the card used for renewals.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty payment method id (no call made).
    #[instrument(skip(self, payment_method_id))]
    pub async fn update_payment_method(&self, payment_method_id: &str) -> Result<(), UserSubscriptionError> {
        if payment_method_id.trim().is_empty() {
            return Err(UserSubscriptionError::validation("Moyen de paiement manquant."));
        }
        let body = self
            .source
            .send(ApiRequest::post("/updateOneClickPayment").json(json!({
                "paymentMethodId": payment_method_id.trim(),
            })))
            .await?;
        check_rejection(&body)?;
        Ok(())
    }
}

fn map_subscription(raw: &Value) -> Option<UserSubscription> {
    let card = wire::field(raw, &["card", "paymentMethod"]).unwrap_or(raw);
    Some(UserSubscription {
        id: SubscriptionId::new(wire::string(raw, &["id", "subscriptionId", "stripeId"])?),
        plan_name: wire::string(raw, &["planName", "plan_name", "name"])
            .or_else(|| wire::field(raw, &["plan"]).and_then(|p| wire::string(p, &["name", "label"])))
            .unwrap_or_default(),
        status: wire::string(raw, &["status", "state"])
            .map_or(SubscriptionStatus::Unknown, |s| SubscriptionStatus::from_wire(&s)),
        price: wire::amount(raw, &["priceTTC", "price", "amount"]).unwrap_or_default(),
        current_period_end: wire::datetime(raw, &["currentPeriodEnd", "current_period_end", "renewalDate"]),
        card_brand: wire::string(card, &["brand", "cardBrand", "card_brand"]),
        card_last4: wire::string(card, &["last4", "cardLast4", "card_last4"]),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::source::MockSource;

    #[tokio::test]
    async fn test_fetch_maps_nested_card() {
        let sub = UserSubscriptionService::new(Arc::new(MockSource::new()))
            .fetch()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.grants_access());
        assert_eq!(sub.card_brand.as_deref(), Some("visa"));
        assert_eq!(sub.card_last4.as_deref(), Some("4242"));
        assert!(sub.current_period_end.is_some());
    }

    #[test]
    fn test_null_subscription_is_none() {
        let body = json!({ "subscription": null });
        assert!(wire::field(&body, &["subscription", "data"]).and_then(map_subscription).is_none());
    }

    #[test]
    fn test_unknown_status_is_kept_as_unknown() {
        let sub = map_subscription(&json!({ "id": "s", "status": "paused" })).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Unknown);
    }
}
