//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Recurring subscription status.
///
/// Mirrors the payment provider's subscription lifecycle as relayed by the
/// backend. Unrecognised values map to [`SubscriptionStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Incomplete,
    Canceled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Parse the backend's loose status string (`"ACTIVE"`, `"past-due"`, `"cancelled"`).
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "active" => Self::Active,
            "trialing" | "trial" => Self::Trialing,
            "past_due" | "unpaid" => Self::PastDue,
            "incomplete" | "incomplete_expired" => Self::Incomplete,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }
}

/// Paid invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Paid,
    Refunded,
    PartiallyRefunded,
}

impl InvoiceStatus {
    /// Parse the backend status string; anything unknown counts as paid,
    /// since the endpoint only returns paid invoices.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "refunded" => Self::Refunded,
            "partially_refunded" | "partial_refund" => Self::PartiallyRefunded,
            _ => Self::Paid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_status_from_wire() {
        assert_eq!(SubscriptionStatus::from_wire("ACTIVE"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_wire("past-due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::from_wire("cancelled"), SubscriptionStatus::Canceled);
        assert_eq!(SubscriptionStatus::from_wire("paused"), SubscriptionStatus::Unknown);
    }

    #[test]
    fn test_invoice_status_defaults_to_paid() {
        assert_eq!(InvoiceStatus::from_wire(""), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_wire("Refunded"), InvoiceStatus::Refunded);
    }
}
