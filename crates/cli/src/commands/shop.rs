//! Catalog, plans and cart commands.

use jdp_client::AppState;
use jdp_client::stores::{CartStoreError, cart_item_for};
use jdp_core::{CatalogSort, ReferenceId, format_eur};
use tracing::info;

use super::flush_notifications;

/// List the catalog.
///
/// # Errors
///
/// Returns an error for an unknown sort or a failed catalog fetch.
pub async fn catalog(
    state: &AppState,
    collection: Option<&str>,
    sort: &str,
    refresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let sort: CatalogSort = sort.parse()?;
    let shop = state.shop_store();
    let outcome = shop.fetch(refresh).await?;
    info!(?outcome, "Catalog loaded");

    let references = shop.view(collection, sort);
    info!(
        count = references.len(),
        collections = ?shop.collections(),
        "References"
    );
    for reference in references {
        let price = reference
            .min_price()
            .map_or_else(|| "prix sur demande".to_string(), format_eur);
        info!("  {} [{}] {} à partir de {}", reference.id, reference.slug, reference.name, price);
    }
    Ok(())
}

/// List subscription plans.
///
/// # Errors
///
/// Returns an error if the plan catalog cannot be fetched.
pub async fn plans(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = state.subscription_catalog_store();
    catalog.fetch(false).await?;
    for plan in catalog.plans() {
        let marker = if plan.is_highlighted { " *" } else { "" };
        info!(
            "  {}{} {} / {} mois",
            plan.id,
            marker,
            format_eur(plan.price),
            plan.interval_months
        );
    }
    Ok(())
}

/// Show the cart.
pub fn cart_list(state: &AppState) {
    let cart = state.cart_store();
    if cart.is_empty() {
        info!("Cart is empty");
        return;
    }
    for item in cart.items() {
        info!("  {} {} {}", item.id, item.name, format_eur(item.price));
    }
    let totals = cart.totals();
    info!(
        subtotal = %format_eur(totals.subtotal),
        excl_vat = %format_eur(totals.subtotal_excl_vat),
        vat = %format_eur(totals.vat_amount),
        basket_code = ?cart.basket_code(),
        "Cart totals"
    );
}

/// Add a catalog reference to the cart.
///
/// # Errors
///
/// Returns an error if the reference is unknown, has no price, or is
/// already in the cart.
pub async fn cart_add(state: &AppState, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let shop = state.shop_store();
    shop.fetch(false).await?;
    let id = ReferenceId::new(id);
    let reference = shop
        .references()
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| format!("Unknown reference: {id}"))?;
    let item = cart_item_for(&reference).ok_or_else(|| format!("Reference {id} has no price"))?;

    let cart = state.cart_store();
    match cart.add(item) {
        Ok(()) => info!(reference = %id, count = cart.count(), "Added to cart"),
        Err(CartStoreError::AlreadyInCart(_)) => info!(reference = %id, "Already in cart"),
        Err(e) => return Err(e.into()),
    }
    flush_notifications(&state.notifications());
    Ok(())
}

/// Remove a reference from the cart.
pub fn cart_remove(state: &AppState, id: &str) {
    let id = ReferenceId::new(id);
    if state.cart_store().remove(&id) {
        info!(reference = %id, "Removed from cart");
    } else {
        info!(reference = %id, "Not in cart");
    }
}

/// Empty the cart.
pub fn cart_clear(state: &AppState) {
    state.cart_store().clear();
    info!("Cart cleared");
}
