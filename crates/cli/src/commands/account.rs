//! Session commands.

use jdp_client::AppState;
use secrecy::SecretString;
use tracing::info;

/// Sign in and persist the session token.
///
/// # Errors
///
/// Returns an error if the credentials are rejected.
pub async fn login(state: &AppState, email: &str, password: SecretString) -> Result<(), Box<dyn std::error::Error>> {
    let auth = state.auth_store();
    auth.login(email, &password).await?;
    if let Some(user) = auth.user() {
        info!(user = %user.display_name(), expires_at = ?auth.token_expires_at(), "Signed in");
    }
    Ok(())
}

/// Sign out.
pub async fn logout(state: &AppState) {
    state.logout().await;
    info!("Signed out");
}

/// Show the signed-in user, restoring the persisted session first.
///
/// # Errors
///
/// Returns an error if the stored session cannot be validated.
pub async fn whoami(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let auth = state.auth_store();
    auth.initialize().await?;
    let Some(user) = auth.user() else {
        info!("Not signed in");
        return Ok(());
    };
    info!(
        id = %user.id,
        email = %user.email,
        jdp_star = user.jdp_star,
        addresses = user.addresses.len(),
        "{}",
        user.display_name()
    );

    let subscription = state.user_subscription_store();
    subscription.fetch(false).await?;
    match subscription.subscription() {
        Some(active) => info!(subscription = ?active, "Subscription"),
        None => info!("No subscription"),
    }
    Ok(())
}
