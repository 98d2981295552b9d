//! Payment intent commands.
//!
//! Only the intent is created here. Card confirmation needs a payment
//! method collected by the provider's UI.

use jdp_client::AppState;
use jdp_client::checkout::{CheckoutFlow, CheckoutKind};
use jdp_core::{PlanId, format_eur};
use tracing::info;

use super::flush_notifications;

/// Sync the cart and create a payment intent for it.
///
/// # Errors
///
/// Returns an error if the cart is empty, cannot be synced, or the intent
/// is refused.
pub async fn init_shop(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    state.auth_store().initialize().await?;
    let cart = state.cart_store();
    if cart.is_empty() {
        return Err("Cart is empty".into());
    }
    cart.sync().await?;
    init(state, CheckoutKind::Shop).await
}

/// Put `plan` in the one-click basket and create a setup intent.
///
/// # Errors
///
/// Returns an error if the plan is refused or the intent cannot be created.
pub async fn init_oneclick(state: &AppState, plan: &str) -> Result<(), Box<dyn std::error::Error>> {
    state.auth_store().initialize().await?;
    let result = state.oneclick_store().add_plan(&PlanId::new(plan)).await;
    flush_notifications(&state.notifications());
    result?;
    init(state, CheckoutKind::OneClick).await
}

async fn init(state: &AppState, kind: CheckoutKind) -> Result<(), Box<dyn std::error::Error>> {
    let checkout = state.checkout(kind);
    for line in checkout.lines() {
        info!("  {} x{} {}", line.label, line.quantity, format_eur(line.amount));
    }
    let totals = checkout.totals();
    let session = checkout.init_payment().await?;
    info!(
        %kind,
        intent = session.intent.as_str(),
        intent_id = ?session.intent_id(),
        total = %format_eur(totals.subtotal),
        "Payment session ready"
    );
    Ok(())
}
