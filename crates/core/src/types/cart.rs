//! Cart types.
//!
//! Two cart shapes coexist. The primary one is the local cart (a set of
//! [`CartItem`], quantity implicitly one, persisted on the device). The
//! secondary [`RemoteBasket`] is the backend basket built at checkout time
//! and does carry quantities.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::ProductKind;
use super::id::{BasketCode, ReferenceId};
use super::price::{deserialize_amount, excl_vat};

/// An entry of the local cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Reference id; unique within a cart.
    pub id: ReferenceId,
    pub name: String,
    /// TTC unit price.
    #[serde(deserialize_with = "deserialize_amount")]
    pub price: Decimal,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub kind: ProductKind,
}

/// Totals derived from a list of TTC prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Σ TTC prices.
    pub subtotal: Decimal,
    /// `subtotal / (1 + VAT_RATE)`.
    pub subtotal_excl_vat: Decimal,
    /// `subtotal - subtotal_excl_vat`.
    pub vat_amount: Decimal,
}

impl CartTotals {
    /// Compute totals from TTC amounts.
    #[must_use]
    pub fn from_ttc<I>(amounts: I) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let subtotal = amounts.into_iter().fold(Decimal::ZERO, Decimal::saturating_add);
        let subtotal_excl_vat = excl_vat(subtotal);
        Self {
            subtotal,
            subtotal_excl_vat,
            vat_amount: subtotal - subtotal_excl_vat,
        }
    }
}

/// A line of the backend basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub reference_id: ReferenceId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl BasketLine {
    /// `unit_price × quantity`, saturating.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// The backend basket identified by a basket code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBasket {
    pub code: BasketCode,
    pub lines: Vec<BasketLine>,
    /// Total as reported by the backend (TTC).
    pub total: Decimal,
}

impl RemoteBasket {
    /// Total recomputed from the lines.
    #[must_use]
    pub fn computed_total(&self) -> Decimal {
        self.lines
            .iter()
            .map(BasketLine::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }
}
