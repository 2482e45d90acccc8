//! HTTP route definitions and handlers.
//!
//! Pages are grouped by concern: sign-in and sign-up flows, the signed-in
//! dashboard, and health checks. The route guard runs in front of all of
//! them.

mod auth_routes;
mod dashboard_routes;
mod health_routes;

use axum::http::HeaderMap;
use axum::{middleware, Router};

use crate::guard::middleware::bearer_token;
use crate::guard::route_guard;
use crate::models::is_expired;
use crate::state::AppState;
use crate::store::cookie_store::read_cookie;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    let paths = state.config.routes.clone();
    Router::new()
        .merge(auth_routes::routes(&paths))
        .merge(dashboard_routes::routes(&paths))
        .merge(health_routes::routes())
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .with_state(state)
}

/// The request's unexpired credential: the auth cookie, else a bearer header.
pub(crate) fn request_credential(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    read_cookie(headers, cookie_name)
        .filter(|token| !is_expired(token))
        .or_else(|| {
            bearer_token(headers)
                .filter(|token| !is_expired(token))
                .map(str::to_string)
        })
}
