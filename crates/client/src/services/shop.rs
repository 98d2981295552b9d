//! Shop catalog.

use std::sync::Arc;
use std::time::Duration;

use jdp_core::{ProductId, ProductKind, ReferenceId, ShopPrice, ShopProduct, ShopReference};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::{ApiRequest, RequestSlot};
use crate::source::SharedSource;

define_service_error!(ShopError, "shop");

/// Catalog endpoint (`/fetchStore`).
#[derive(Clone)]
pub struct ShopService {
    source: SharedSource,
    slot: Arc<RequestSlot>,
    timeout: Duration,
}

impl std::fmt::Debug for ShopService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopService")
            .field("source", &self.source.label())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ShopService {
    #[must_use]
    pub fn new(source: SharedSource, timeout: Duration) -> Self {
        Self {
            source,
            slot: Arc::new(RequestSlot::new("shop.catalog")),
            timeout,
        }
    }

    /// Fetch the whole catalog. A newer call supersedes one in flight.
    ///
    /// # Errors
    ///
    /// `Cancelled` when superseded, `Timeout` past the configured timeout,
    /// otherwise the classified backend failure.
    #[instrument(skip(self))]
    pub async fn fetch_catalog(&self) -> Result<Vec<ShopReference>, ShopError> {
        let body = self
            .slot
            .run(self.timeout, self.source.send(ApiRequest::get("/fetchStore")))
            .await?;
        check_rejection(&body)?;

        let references: Vec<ShopReference> = wire::items(&body, &["references", "store", "data"])
            .iter()
            .filter_map(map_reference)
            .collect();
        debug!(count = references.len(), "Catalog fetched");
        Ok(references)
    }

    /// Abandon an in-flight catalog fetch.
    pub fn cancel(&self) {
        self.slot.cancel();
    }
}

fn map_reference(raw: &Value) -> Option<ShopReference> {
    let id = wire::string(raw, &["id", "idReference", "reference_id"])?;
    let name = wire::string(raw, &["name", "title", "label"]).map_or_else(|| id.clone(), |n| wire::decode_entities(&n));
    let slug = wire::string(raw, &["slug", "handle"]).unwrap_or_else(|| id.clone());
    let products: Vec<ShopProduct> = wire::list(raw, &["products", "produits"])
        .iter()
        .filter_map(map_product)
        .collect();

    for product in &products {
        for price in product.prices.iter().filter(|p| !p.is_consistent()) {
            warn!(
                reference = %id,
                product = %product.id,
                amount = %price.amount,
                ht_amount = %price.ht_amount,
                vat_rate = %price.vat_rate,
                "Inconsistent TTC/HT price row"
            );
        }
    }

    Some(ShopReference {
        id: ReferenceId::new(id),
        slug,
        name,
        description: wire::string(raw, &["description", "desc"]).map(|d| wire::decode_entities(&d)),
        image_url: wire::string(raw, &["image", "imageUrl", "image_url", "thumbnail"]),
        collections: wire::strings(raw, &["collections", "collection", "categories"]),
        created_at: wire::datetime(raw, &["createdAt", "created_at", "date"]),
        products,
    })
}

fn map_product(raw: &Value) -> Option<ShopProduct> {
    let id = wire::string(raw, &["id", "idProduct", "product_id"])?;
    Some(ShopProduct {
        id: ProductId::new(id.clone()),
        name: wire::string(raw, &["name", "title", "label"]).map_or(id, |n| wire::decode_entities(&n)),
        kind: product_kind(wire::string(raw, &["type", "kind", "productType"]).as_deref()),
        weight_grams: wire::amount(raw, &["weight", "weightGrams", "poids"]),
        prices: wire::list(raw, &["prices", "prix"]).iter().filter_map(map_price).collect(),
    })
}

fn product_kind(raw: Option<&str>) -> ProductKind {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("immaterial" | "immateriel" | "immatériel" | "digital" | "numerique" | "numérique") => {
            ProductKind::Immaterial
        }
        _ => ProductKind::Physical,
    }
}

/// Map a price row. A missing HT amount is derived from the VAT rate; a
/// missing VAT rate is derived from both amounts. When neither derivation
/// is possible the row is taken as untaxed.
fn map_price(raw: &Value) -> Option<ShopPrice> {
    let amount = wire::amount(raw, &["amount", "priceTTC", "price", "ttc"])?;
    let ht_amount = wire::amount(raw, &["htAmount", "priceHT", "ht", "amountHT"]);
    let vat_rate = wire::amount(raw, &["vatRate", "tva", "vat", "taxRate"]);

    let derived = match (ht_amount, vat_rate) {
        (Some(ht), Some(rate)) => Some((ht, rate)),
        (None, Some(rate)) => ht_from_rate(amount, rate).map(|ht| (ht, rate)),
        (Some(ht), None) => rate_from_ht(amount, ht).map(|rate| (ht, rate)),
        (None, None) => None,
    };
    let (ht_amount, vat_rate) = derived.unwrap_or_else(|| {
        if ht_amount.is_some() || vat_rate.is_some() {
            warn!(%amount, ?ht_amount, ?vat_rate, "Unusable tax data on price row, treating as untaxed");
        }
        (amount, Decimal::ZERO)
    });

    Some(ShopPrice {
        currency: wire::string(raw, &["currency", "devise"]).unwrap_or_else(|| "EUR".to_string()),
        amount,
        ht_amount,
        vat_rate,
        is_promotional: wire::flag(raw, &["isPromotional", "isPromo", "promo"]).unwrap_or(false),
    })
}

/// `amount / (1 + rate / 100)`, or `None` when the factor is not positive.
fn ht_from_rate(amount: Decimal, rate: Decimal) -> Option<Decimal> {
    let factor = Decimal::ONE.checked_add(rate.checked_div(Decimal::ONE_HUNDRED)?)?;
    if factor <= Decimal::ZERO {
        return None;
    }
    amount.checked_div(factor).map(|ht| ht.round_dp(2))
}

/// `(amount / ht - 1) × 100`, or `None` for a zero HT or on overflow.
fn rate_from_ht(amount: Decimal, ht: Decimal) -> Option<Decimal> {
    amount
        .checked_div(ht)?
        .checked_sub(Decimal::ONE)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|rate| rate.round_dp(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::source::MockSource;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_mock_catalog_maps_all_references() {
        let service = ShopService::new(Arc::new(MockSource::new()), Duration::from_secs(30));
        let catalog = service.fetch_catalog().await.unwrap();
        assert_eq!(catalog.len(), 4);

        let napoleon = &catalog[0];
        assert_eq!(napoleon.name, "Napoléon 20 Francs & Marianne");
        assert_eq!(napoleon.min_price(), Some(dec("389.90")));
        assert_eq!(napoleon.products[1].weight_grams, Some(dec("64.5")));

        let krugerrand = &catalog[1];
        assert_eq!(krugerrand.name, "Krugerrand 1 once");
        assert_eq!(krugerrand.collections, ["pieces-or"]);
        assert_eq!(krugerrand.products[0].kind, ProductKind::Physical);

        assert!(catalog[3].has_immaterial());
        assert!(catalog.iter().flat_map(|r| &r.products).flat_map(|p| &p.prices).all(ShopPrice::is_consistent));
    }

    #[test]
    fn test_price_derives_missing_ht() {
        let p = map_price(&json!({ "priceTTC": "120", "tva": 20 })).unwrap();
        assert_eq!(p.ht_amount, dec("100"));
        assert!(p.is_consistent());
    }

    #[test]
    fn test_price_derives_missing_rate() {
        let p = map_price(&json!({ "amount": 110, "htAmount": 100 })).unwrap();
        assert_eq!(p.vat_rate, dec("10"));
    }

    #[test]
    fn test_degenerate_rate_is_untaxed() {
        let p = map_price(&json!({ "amount": 10, "vatRate": -100 })).unwrap();
        assert_eq!((p.amount, p.ht_amount, p.vat_rate), (dec("10"), dec("10"), Decimal::ZERO));
        assert!(p.is_consistent());

        let p = map_price(&json!({ "amount": 10, "htAmount": 0 })).unwrap();
        assert_eq!((p.ht_amount, p.vat_rate), (dec("10"), Decimal::ZERO));
    }

    #[test]
    fn test_extreme_amounts_do_not_panic() {
        let p = map_price(&json!({ "amount": "79228162514264337593543950335", "htAmount": "0.0000001" })).unwrap();
        assert_eq!((p.ht_amount, p.vat_rate), (p.amount, Decimal::ZERO));
    }

    #[test]
    fn test_price_without_amount_is_dropped() {
        assert!(map_price(&json!({ "currency": "EUR" })).is_none());
    }

    #[test]
    fn test_reference_without_id_is_dropped() {
        assert!(map_reference(&json!({ "name": "Sans id" })).is_none());
    }
}
