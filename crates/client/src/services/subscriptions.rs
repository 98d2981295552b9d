//! One-click subscription catalog and basket.

use jdp_core::{AddressId, BasketCode, OneClickBasket, OneClickBasketItem, PlanId, SubscriptionId, SubscriptionPlan};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(SubscriptionError, "subscription");

/// Result of a completed one-click checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneClickReceipt {
    pub subscription_id: Option<SubscriptionId>,
}

/// One-click endpoints.
#[derive(Clone)]
pub struct SubscriptionService {
    source: SharedSource,
}

impl std::fmt::Debug for SubscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl SubscriptionService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Available plans.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn fetch_catalog(&self) -> Result<Vec<SubscriptionPlan>, SubscriptionError> {
        let body = self.source.send(ApiRequest::get("/fetchOneClickCatalog")).await?;
        check_rejection(&body)?;
        let plans: Vec<SubscriptionPlan> = wire::items(&body, &["plans", "catalog", "data"])
            .iter()
            .filter_map(map_plan)
            .collect();
        debug!(count = plans.len(), "Plan catalog fetched");
        Ok(plans)
    }

    /// Basket identified by `basket_code`; an empty basket when `None`.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self), fields(basket_code = ?basket_code.map(BasketCode::as_str)))]
    pub async fn fetch_basket(&self, basket_code: Option<&BasketCode>) -> Result<OneClickBasket, SubscriptionError> {
        let body = self
            .source
            .send(ApiRequest::post("/fetchOneClickBasket").json(json!({
                "basketCode": basket_code.map(BasketCode::as_str),
            })))
            .await?;
        map_basket(&body)
    }

    /// Start a fresh basket holding only `plan_id`.
    ///
    /// No previous basket code is sent: a plan selection never merges into
    /// an earlier basket.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty plan id, `NotFound` for an unknown plan.
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    pub async fn add_plan(&self, plan_id: &PlanId) -> Result<OneClickBasket, SubscriptionError> {
        if plan_id.is_empty() {
            return Err(SubscriptionError::validation("Aucune formule sélectionnée."));
        }
        let body = self
            .source
            .send(ApiRequest::post("/addOneClick").json(json!({ "planId": plan_id.as_str() })))
            .await?;
        let basket = map_basket(&body)?;
        if basket.code.is_none() {
            return Err(SubscriptionError::invalid_response("Panier sans code."));
        }
        Ok(basket)
    }

    /// Remove the plan from the basket.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self), fields(basket_code = %basket_code, plan_id = %plan_id))]
    pub async fn delete_plan(
        &self,
        basket_code: &BasketCode,
        plan_id: &PlanId,
    ) -> Result<OneClickBasket, SubscriptionError> {
        let body = self
            .source
            .send(ApiRequest::post("/deleteOneClick").json(json!({
                "basketCode": basket_code.as_str(),
                "planId": plan_id.as_str(),
            })))
            .await?;
        map_basket(&body)
    }

    /// Finalise the subscription once the setup intent is confirmed.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty basket code (no call made).
    #[instrument(skip(self), fields(basket_code = %basket_code))]
    pub async fn checkout(
        &self,
        basket_code: &BasketCode,
        address_id: Option<&AddressId>,
    ) -> Result<OneClickReceipt, SubscriptionError> {
        if basket_code.is_empty() {
            return Err(SubscriptionError::validation("Code panier manquant."));
        }
        let body = self
            .source
            .send(ApiRequest::post("/oneClickCheckout").json(json!({
                "basketCode": basket_code.as_str(),
                "addressId": address_id.map(AddressId::as_str),
            })))
            .await?;
        check_rejection(&body)?;
        Ok(OneClickReceipt {
            subscription_id: wire::string(wire::unwrap(&body, &["data"]), &["subscriptionId", "subscription_id", "id"])
                .map(SubscriptionId::new),
        })
    }
}

fn interval_months(raw: &Value) -> u32 {
    if let Some(months) = wire::count_u32(raw, &["intervalMonths", "interval_months", "duration"]) {
        return months.max(1);
    }
    match wire::string(raw, &["interval", "period", "billingPeriod"])
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("year" | "yearly" | "annual" | "annuel" | "an") => 12,
        Some("semester" | "semestre") => 6,
        Some("quarter" | "trimestre") => 3,
        _ => 1,
    }
}

fn map_plan(raw: &Value) -> Option<SubscriptionPlan> {
    let id = wire::string(raw, &["id", "idOneClick", "planId"])?;
    Some(SubscriptionPlan {
        id: PlanId::new(id.clone()),
        name: wire::string(raw, &["name", "label", "title"]).map_or(id, |n| wire::decode_entities(&n)),
        description: wire::string(raw, &["description"]).map(|d| wire::decode_entities(&d)),
        price: wire::amount(raw, &["priceTTC", "price", "amount"])?,
        interval_months: interval_months(raw),
        features: wire::strings(raw, &["features", "advantages"]),
        is_highlighted: wire::flag(raw, &["highlight", "isHighlighted", "featured"]).unwrap_or(false),
    })
}

fn map_basket(body: &Value) -> Result<OneClickBasket, SubscriptionError> {
    check_rejection(body)?;
    let basket = wire::unwrap(body, &["basket", "data"]);
    let item = wire::field(basket, &["item", "oneClick", "plan"]).and_then(|raw| {
        Some(OneClickBasketItem {
            plan_id: PlanId::new(wire::id(raw, &["idOneClick", "planId", "id"])?),
            name: wire::string(raw, &["name", "label"])
                .map(|n| wire::decode_entities(&n))
                .unwrap_or_default(),
            price: wire::amount(raw, &["priceTTC", "price", "amount"]).unwrap_or_default(),
        })
    });
    Ok(OneClickBasket {
        code: wire::string(basket, &["basketCode", "basket_code", "code"]).map(BasketCode::new),
        item,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use super::*;
    use crate::source::MockSource;
    use jdp_core::ErrorCode;
    use rust_decimal::Decimal;

    fn service() -> SubscriptionService {
        SubscriptionService::new(Arc::new(MockSource::new()))
    }

    #[tokio::test]
    async fn test_catalog_maps_mixed_shapes() {
        let plans = service().fetch_catalog().await.unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].price, Decimal::from_str("9.90").unwrap());
        assert_eq!(plans[1].name, "Premium");
        assert!(plans[1].is_highlighted);
        assert_eq!(plans[2].interval_months, 12);
        assert_eq!(plans[2].features, ["Deux mois offerts"]);
    }

    #[tokio::test]
    async fn test_add_plan_starts_fresh_basket() {
        let first = service().add_plan(&PlanId::new("essentiel")).await.unwrap();
        let second = service().add_plan(&PlanId::new("premium")).await.unwrap();
        assert_ne!(first.code, second.code);
        assert_eq!(second.item.unwrap().plan_id.as_str(), "premium");
    }

    #[tokio::test]
    async fn test_add_unknown_plan() {
        let err = service().add_plan(&PlanId::new("platine")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_fetch_basket_without_code_is_empty() {
        let basket = service().fetch_basket(None).await.unwrap();
        assert!(basket.is_empty());
        assert!(basket.code.is_none());
    }

    #[tokio::test]
    async fn test_delete_plan_clears_item() {
        let basket = service()
            .delete_plan(&BasketCode::new("OC-premium"), &PlanId::new("premium"))
            .await
            .unwrap();
        assert!(basket.item.is_none());
        assert_eq!(basket.code.unwrap().as_str(), "OC-premium");
    }

    #[tokio::test]
    async fn test_checkout_returns_subscription() {
        let receipt = service()
            .checkout(&BasketCode::new("OC-premium"), None)
            .await
            .unwrap();
        assert_eq!(receipt.subscription_id.unwrap().as_str(), "sub_mock_oc_premium");
    }
}
