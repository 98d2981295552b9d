//! Shop catalog: references, products and prices.
//!
//! The catalog is a three-level hierarchy. A [`ShopReference`] is the
//! sellable unit shown on listing pages (a coin, a bar, a report bundle); it
//! contains one or more [`ShopProduct`] variants (physical or immaterial),
//! and every product carries one or more [`ShopPrice`] rows.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, ReferenceId};
use super::price::PRICE_TOLERANCE;

/// How a product is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Shipped to a postal address.
    #[default]
    Physical,
    /// Digital delivery (reports, videos, access rights).
    Immaterial,
}

/// A single price row.
///
/// `amount` is TTC; `ht_amount` and `vat_rate` (a percentage, e.g. `20`)
/// must satisfy `amount ≈ ht_amount × (1 + vat_rate / 100)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopPrice {
    /// ISO 4217 currency code.
    pub currency: String,
    /// Tax-inclusive amount.
    pub amount: Decimal,
    /// Tax-exclusive amount.
    pub ht_amount: Decimal,
    /// VAT rate as a percentage.
    pub vat_rate: Decimal,
    /// Whether this is a promotional price.
    pub is_promotional: bool,
}

impl ShopPrice {
    /// Check the TTC/HT/VAT relation within one cent. Amounts too large
    /// to compare are reported inconsistent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        Decimal::ONE
            .checked_add(self.vat_rate / Decimal::ONE_HUNDRED)
            .and_then(|factor| self.ht_amount.checked_mul(factor))
            .and_then(|expected| expected.checked_sub(self.amount))
            .is_some_and(|diff| diff.abs() <= PRICE_TOLERANCE)
    }
}

/// A deliverable variant of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopProduct {
    pub id: ProductId,
    pub name: String,
    pub kind: ProductKind,
    /// Weight in grams for physical products.
    pub weight_grams: Option<Decimal>,
    pub prices: Vec<ShopPrice>,
}

impl ShopProduct {
    /// Lowest TTC amount across this product's prices.
    #[must_use]
    pub fn min_price(&self) -> Option<Decimal> {
        self.prices.iter().map(|p| p.amount).min()
    }
}

/// A sellable unit / collection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopReference {
    pub id: ReferenceId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Collection slugs this reference belongs to.
    pub collections: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub products: Vec<ShopProduct>,
}

impl ShopReference {
    /// Minimum price over every product; used as the listing sort key.
    #[must_use]
    pub fn min_price(&self) -> Option<Decimal> {
        self.products.iter().filter_map(ShopProduct::min_price).min()
    }

    /// Whether the reference belongs to the given collection.
    #[must_use]
    pub fn in_collection(&self, collection: &str) -> bool {
        self.collections
            .iter()
            .any(|c| c.eq_ignore_ascii_case(collection))
    }

    /// Whether any product variant is immaterial.
    #[must_use]
    pub fn has_immaterial(&self) -> bool {
        self.products
            .iter()
            .any(|p| p.kind == ProductKind::Immaterial)
    }
}

/// Listing sort orders accepted by the catalog page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CatalogSort {
    /// Backend order.
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Newest,
}

impl CatalogSort {
    /// URL/query-string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::NameAsc => "name-asc",
            Self::NameDesc => "name-desc",
            Self::Newest => "newest",
        }
    }

    /// Sort references in place. The sort is stable, so equal keys keep
    /// backend order. References without any price sort last.
    pub fn apply(self, references: &mut [ShopReference]) {
        match self {
            Self::Default => {}
            Self::PriceAsc => references.sort_by(|a, b| cmp_price(a, b, false)),
            Self::PriceDesc => references.sort_by(|a, b| cmp_price(a, b, true)),
            Self::NameAsc => references.sort_by_cached_key(|r| r.name.to_lowercase()),
            Self::NameDesc => {
                references.sort_by(|a, b| b.name.to_lowercase().cmp(&a.name.to_lowercase()));
            }
            Self::Newest => references.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }
}

fn cmp_price(a: &ShopReference, b: &ShopReference, descending: bool) -> Ordering {
    match (a.min_price(), b.min_price()) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Error returned when a sort string is unknown.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown catalog sort: {0}")]
pub struct UnknownSort(pub String);

impl FromStr for CatalogSort {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "default" => Ok(Self::Default),
            "price-asc" => Ok(Self::PriceAsc),
            "price-desc" => Ok(Self::PriceDesc),
            "name-asc" => Ok(Self::NameAsc),
            "name-desc" => Ok(Self::NameDesc),
            "newest" => Ok(Self::Newest),
            other => Err(UnknownSort(other.to_string())),
        }
    }
}
