//! Application startup and server initialization.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::client::IdentityClient;
use crate::config::ConfigV1;
use crate::routes;
use crate::state::AppState;

/// Builds the identity client and serves the page shell on the configured
/// bind address.
///
/// # Errors
///
/// Returns an error if the identity client cannot be built, the address
/// cannot be bound, or the server stops with an error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let identity = IdentityClient::new(&config.identity)?;

    info!(
        event_name = "startup.listening",
        event_domain = "startup",
        bind_address = config.bind_address.as_str(),
        identity_url = identity.base_url(),
        "Starting server"
    );

    let state = AppState::new(config.clone(), identity);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
