//! Paid shop invoices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::OrderId;
use super::status::InvoiceStatus;

/// A paid invoice attached to a shop order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub order_id: OrderId,
    pub number: String,
    pub issued_at: Option<DateTime<Utc>>,
    /// TTC total.
    pub total: Decimal,
    pub pdf_url: Option<String>,
    pub status: InvoiceStatus,
}
