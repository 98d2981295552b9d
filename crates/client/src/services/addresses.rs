//! Postal address book.

use jdp_core::{Address, AddressId, AddressInput};
use serde_json::{Value, json};
use tracing::instrument;

use super::error::define_service_error;
use super::{check_rejection, wire};
use crate::http::ApiRequest;
use crate::source::SharedSource;

define_service_error!(AddressError, "address");

/// Address endpoints (`/fetchUserAdress`, `/createAdress`, ...).
#[derive(Clone)]
pub struct AddressService {
    source: SharedSource,
}

impl std::fmt::Debug for AddressService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressService")
            .field("source", &self.source.label())
            .finish()
    }
}

impl AddressService {
    #[must_use]
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// The user's addresses.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Address>, AddressError> {
        let body = self.source.send(ApiRequest::get("/fetchUserAdress")).await?;
        check_rejection(&body)?;
        Ok(wire::items(&body, &["adresses", "addresses", "data"])
            .iter()
            .filter_map(map_address)
            .collect())
    }

    /// Create an address.
    ///
    /// # Errors
    ///
    /// `Validation` when a required field is blank (no call made).
    #[instrument(skip(self, input), fields(city = %input.city))]
    pub async fn create(&self, input: &AddressInput) -> Result<Address, AddressError> {
        let payload = validated(input)?;
        let body = self
            .source
            .send(ApiRequest::post("/createAdress").json(payload))
            .await?;
        map_single(&body)
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// `Validation` when a required field is blank (no call made).
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update(&self, id: &AddressId, input: &AddressInput) -> Result<Address, AddressError> {
        let mut payload = validated(input)?;
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("id".to_string(), json!(id.as_str()));
        }
        let body = self
            .source
            .send(ApiRequest::post("/updateAdress").json(payload))
            .await?;
        map_single(&body)
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns the classified backend failure.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete(&self, id: &AddressId) -> Result<(), AddressError> {
        if id.is_empty() {
            return Err(AddressError::validation("Adresse inconnue."));
        }
        let body = self
            .source
            .send(ApiRequest::post("/deleteAdress").json(json!({ "id": id.as_str() })))
            .await?;
        check_rejection(&body)?;
        Ok(())
    }
}

fn validated(input: &AddressInput) -> Result<Value, AddressError> {
    let missing = input.missing_fields();
    if !missing.is_empty() {
        return Err(AddressError::validation(format!(
            "Champs requis manquants: {}",
            missing.join(", ")
        )));
    }
    serde_json::to_value(input).map_err(|e| AddressError::validation(e.to_string()))
}

fn map_single(body: &Value) -> Result<Address, AddressError> {
    check_rejection(body)?;
    map_address(wire::unwrap(body, &["adress", "address", "data"]))
        .ok_or_else(|| AddressError::invalid_response("Adresse illisible dans la réponse."))
}

/// Map a backend address; `None` when it has no id or no street.
pub(crate) fn map_address(raw: &Value) -> Option<Address> {
    Some(Address {
        id: AddressId::new(wire::string(raw, &["id", "idAdress", "idAddress"])?),
        label: wire::string(raw, &["label", "name"]),
        first_name: wire::string(raw, &["firstName", "firstname", "first_name"]),
        last_name: wire::string(raw, &["lastName", "lastname", "last_name"]),
        company: wire::string(raw, &["company", "societe"]),
        street: wire::string(raw, &["street", "address", "address1", "adresse"])?,
        street_complement: wire::string(raw, &["streetComplement", "address2", "complement"]),
        postal_code: wire::string(raw, &["postalCode", "zipcode", "zip", "postal_code"]).unwrap_or_default(),
        city: wire::string(raw, &["city", "ville"]).unwrap_or_default(),
        country: wire::string(raw, &["country", "countryCode", "pays"]).unwrap_or_else(|| "FR".to_string()),
        phone: wire::string(raw, &["phone", "telephone"]),
        is_default_shipping: wire::flag(raw, &["isDefaultShipping", "is_default_shipping", "defaultShipping"])
            .unwrap_or(false),
        is_default_billing: wire::flag(raw, &["isDefaultBilling", "is_default_billing", "defaultBilling"])
            .unwrap_or(false),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::source::MockSource;
    use jdp_core::ErrorCode;

    fn service() -> AddressService {
        AddressService::new(Arc::new(MockSource::new()))
    }

    fn input() -> AddressInput {
        AddressInput {
            street: "1 quai de Conti".to_string(),
            postal_code: "75006".to_string(),
            city: "Paris".to_string(),
            country: "FR".to_string(),
            ..AddressInput::default()
        }
    }

    #[tokio::test]
    async fn test_list_maps_both_naming_styles() {
        let list = service().list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].is_default_shipping && list[0].is_default_billing);
        assert_eq!(list[1].street_complement.as_deref(), Some("3e étage"));
        assert!(!list[1].is_default_shipping);
    }

    #[tokio::test]
    async fn test_create_returns_assigned_id() {
        let created = service().create(&input()).await.unwrap();
        assert_eq!(created.id.as_str(), "adr-mock-75006");
        assert_eq!(created.city, "Paris");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields_locally() {
        let err = service()
            .create(&AddressInput::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
        assert!(err.message.contains("postalCode"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let id = AddressId::new("312");
        let updated = service().update(&id, &input()).await.unwrap();
        assert_eq!(updated.id, id);
        service().delete(&id).await.unwrap();
    }
}
