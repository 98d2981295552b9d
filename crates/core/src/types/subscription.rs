//! One-click (recurring subscription) types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{BasketCode, PlanId, SubscriptionId};
use super::status::SubscriptionStatus;

/// A plan from the one-click catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    pub description: Option<String>,
    /// TTC price charged every billing interval.
    pub price: Decimal,
    /// Billing interval in months.
    pub interval_months: u32,
    pub features: Vec<String>,
    pub is_highlighted: bool,
}

/// The single plan held by a one-click basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneClickBasketItem {
    pub plan_id: PlanId,
    pub name: String,
    /// TTC price; the backend never sends HT for plans.
    pub price: Decimal,
}

/// A one-click basket: a basket code and at most one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OneClickBasket {
    pub code: Option<BasketCode>,
    pub item: Option<OneClickBasketItem>,
}

impl OneClickBasket {
    /// Whether the basket holds no plan.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item.is_none()
    }
}

/// The authenticated user's current subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: SubscriptionId,
    pub plan_name: String,
    pub status: SubscriptionStatus,
    pub price: Decimal,
    pub current_period_end: Option<DateTime<Utc>>,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
}

impl UserSubscription {
    /// Whether the subscription grants access right now.
    #[must_use]
    pub const fn grants_access(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }
}
