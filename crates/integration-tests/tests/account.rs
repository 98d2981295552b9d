//! Account area: addresses, invoices and logout.

#![allow(clippy::unwrap_used)]

use jdp_core::AddressInput;
use jdp_integration_tests::FakeBackend;
use secrecy::SecretString;

async fn signed_in(backend: &FakeBackend) -> jdp_client::AppState {
    let (state, _) = backend.state();
    state
        .auth_store()
        .login("camille@example.fr", &SecretString::from("secret123".to_string()))
        .await
        .unwrap();
    state
}

#[tokio::test]
async fn test_new_default_address_takes_over_flags() {
    let backend = FakeBackend::start().await;
    let state = signed_in(&backend).await;
    let addresses = state.address_store();

    addresses.fetch(false).await.unwrap();
    assert_eq!(addresses.addresses().len(), 2);
    assert_eq!(addresses.default_shipping().unwrap().city, "Paris");

    let created = addresses
        .create(&AddressInput {
            label: Some("Maison de campagne".to_string()),
            street: "1 chemin des Vignes".to_string(),
            postal_code: "21200".to_string(),
            city: "Beaune".to_string(),
            country: "FR".to_string(),
            is_default_shipping: true,
            ..AddressInput::default()
        })
        .await
        .unwrap();

    assert_eq!(created.id.as_str(), "adr-mock-21200");
    assert_eq!(addresses.addresses().len(), 3);
    assert_eq!(addresses.default_shipping().unwrap().id, created.id);
    // Billing default is untouched.
    assert_eq!(addresses.default_billing().unwrap().city, "Paris");
}

#[tokio::test]
async fn test_invoices_newest_first() {
    let backend = FakeBackend::start().await;
    let state = signed_in(&backend).await;
    let orders = state.order_store();

    orders.fetch(false).await.unwrap();

    let numbers: Vec<String> = orders.invoices().into_iter().map(|i| i.number).collect();
    assert_eq!(numbers, vec!["F-2024-000402".to_string(), "F-2024-000311".to_string()]);
}

#[tokio::test]
async fn test_logout_clears_user_scoped_state() {
    let backend = FakeBackend::start().await;
    let state = signed_in(&backend).await;
    state.address_store().fetch(false).await.unwrap();
    state.bookmark_store().load().await.unwrap();

    state.logout().await;

    assert!(!state.auth_store().is_authenticated());
    assert!(state.address_store().addresses().is_empty());
    assert!(state.bookmark_store().slugs().is_empty());
    let logout = backend.requests_to("/auth/logout");
    assert_eq!(logout.len(), 1);
    assert_eq!(logout[0].bearer(), Some("mock.camille_example_fr"));
}
