//! API-backed basket.
//!
//! The local cart lives on the device (see `stores::cart`); this service
//! manages the backend basket it is pushed into at checkout time.

use jdp_core::{BasketCode, BasketLine, CartItem, ReferenceId, RemoteBasket};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(CartError, "cart");

/// Basket endpoints.
#[derive(Clone)]
pub struct CartService {
    source: SharedSource,
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl CartService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Current backend basket.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn fetch_basket(&self) -> Result<RemoteBasket, CartError> {
        let body = self.source.send(ApiRequest::get("/fetchBasket")).await?;
        map_basket(&body)
    }

    /// Add a reference, creating a basket when `basket_code` is `None`.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero quantity (no call made), otherwise the
    /// classified backend failure or an in-body rejection.
    #[instrument(skip(self), fields(basket_code = ?basket_code.map(BasketCode::as_str), reference = %reference))]
    pub async fn add_reference(
        &self,
        basket_code: Option<&BasketCode>,
        reference: &ReferenceId,
        quantity: u32,
    ) -> Result<RemoteBasket, CartError> {
        if quantity == 0 {
            return Err(CartError::validation("La quantité doit être positive."));
        }
        if reference.is_empty() {
            return Err(CartError::validation("Référence manquante."));
        }
        let mut payload = json!({
            "idReference": reference.as_str(),
            "quantity": quantity,
        });
        if let (Some(code), Some(obj)) = (basket_code, payload.as_object_mut()) {
            obj.insert("basketCode".to_string(), json!(code.as_str()));
        }
        let body = self
            .source
            .send(ApiRequest::post("/addReference").json(payload))
            .await?;
        map_basket(&body)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// `Validation` for a negative quantity (no call made), `BasketExpired`
    /// when the backend no longer knows the basket.
    #[instrument(skip(self), fields(basket_code = %basket_code, reference = %reference))]
    pub async fn change_quantity(
        &self,
        basket_code: &BasketCode,
        reference: &ReferenceId,
        quantity: i64,
    ) -> Result<RemoteBasket, CartError> {
        if quantity < 0 {
            return Err(CartError::validation("La quantité ne peut pas être négative."));
        }
        if basket_code.is_empty() {
            return Err(CartError::validation("Code panier manquant."));
        }
        let body = self
            .source
            .send(ApiRequest::post("/basketChangeQuantityReference").json(json!({
                "basketCode": basket_code.as_str(),
                "idReference": reference.as_str(),
                "quantity": quantity,
            })))
            .await?;
        map_basket(&body)
    }

    /// Push every local cart item into a backend basket and return its code.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty cart; otherwise the first failing add.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn sync_local_cart(
        &self,
        existing: Option<&BasketCode>,
        items: &[CartItem],
    ) -> Result<BasketCode, CartError> {
        if items.is_empty() {
            return Err(CartError::validation("Le panier est vide."));
        }
        let mut code = existing.cloned();
        for item in items {
            let basket = self.add_reference(code.as_ref(), &item.id, 1).await?;
            code = Some(basket.code);
        }
        let code = code.ok_or_else(|| CartError::invalid_response("Aucun code panier renvoyé."))?;
        debug!(basket_code = %code, "Local cart synchronised");
        Ok(code)
    }
}

fn map_basket(body: &Value) -> Result<RemoteBasket, CartError> {
    check_rejection(body)?;
    let basket = wire::unwrap(body, &["basket", "data"]);
    let code = wire::string(basket, &["basketCode", "basket_code", "code"])
        .ok_or_else(|| CartError::invalid_response("Panier sans code."))?;
    let lines: Vec<BasketLine> = wire::list(basket, &["references", "lines", "items"])
        .iter()
        .filter_map(|line| {
            Some(BasketLine {
                reference_id: ReferenceId::new(wire::id(line, &["idReference", "referenceId", "reference", "id"])?),
                name: wire::string(line, &["label", "name", "title"])
                    .map(|n| wire::decode_entities(&n))
                    .unwrap_or_default(),
                unit_price: wire::amount(line, &["priceTTC", "price", "unitPrice"]).unwrap_or_default(),
                quantity: wire::count_u32(line, &["quantity", "qty"]).unwrap_or(1),
            })
        })
        .collect();
    let mut basket = RemoteBasket {
        code: BasketCode::new(code),
        lines,
        total: wire::amount(basket, &["totalTTC", "total", "amount"]).unwrap_or_default(),
    };
    if basket.total.is_zero() {
        basket.total = basket.computed_total();
    }
    Ok(basket)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use super::*;
    use crate::source::MockSource;
    use jdp_core::{ErrorCode, ProductKind};
    use rust_decimal::Decimal;

    fn service() -> CartService {
        CartService::new(Arc::new(MockSource::new()))
    }

    fn item(id: &str) -> CartItem {
        CartItem {
            id: ReferenceId::new(id),
            name: id.to_string(),
            price: Decimal::ONE,
            slug: None,
            image_url: None,
            kind: ProductKind::Physical,
        }
    }

    #[tokio::test]
    async fn test_fetch_basket_decodes_names_and_prices() {
        let basket = service().fetch_basket().await.unwrap();
        assert_eq!(basket.code.as_str(), "MOCK-BASKET-001");
        assert_eq!(basket.lines[0].name, "Napoléon 20 Francs");
        assert_eq!(basket.total, Decimal::from_str("389.90").unwrap());
    }

    #[tokio::test]
    async fn test_negative_quantity_rejected_locally() {
        let err = service()
            .change_quantity(&BasketCode::new("B"), &ReferenceId::new("ref-krugerrand"), -1)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_rejection_in_200_body() {
        let err = service()
            .add_reference(None, &ReferenceId::new("ref-inconnue"), 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.status, None);
    }

    #[tokio::test]
    async fn test_sync_keeps_first_basket_code() {
        let code = service()
            .sync_local_cart(None, &[item("ref-napoleon-20f"), item("ref-rapport-2024")])
            .await
            .unwrap();
        assert_eq!(code.as_str(), "MOCK-BASKET-001");
    }

    #[tokio::test]
    async fn test_sync_empty_cart_is_validation() {
        let err = service().sync_local_cart(None, &[]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_change_quantity_zero_empties_line() {
        let basket = service()
            .change_quantity(&BasketCode::new("B-1"), &ReferenceId::new("ref-krugerrand"), 0)
            .await
            .unwrap();
        assert!(basket.lines.is_empty());
        assert!(basket.total.is_zero());
    }
}
