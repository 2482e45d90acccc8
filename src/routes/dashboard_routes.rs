//! Signed-in pages.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::info;

use super::request_credential;
use crate::client::ApiError;
use crate::config::RoutesConfig;
use crate::models::{is_expired, ProfileView, User};
use crate::session::fetch_identity;
use crate::state::AppState;
use crate::store::cookie_store::{clear_cookie, set_cookie};
use crate::utils::http_helpers::{see_other, HTTPError};
use crate::views::{dashboard_page, profile_page};

pub fn routes(paths: &RoutesConfig) -> Router<AppState> {
    let profile_path = format!("{}/profile", paths.dashboard.trim_end_matches('/'));
    let router = Router::new()
        .route("/", get(home))
        .route(paths.dashboard.as_str(), get(dashboard_home))
        .route(&profile_path, get(profile));
    if profile_path == "/profile" {
        router
    } else {
        router.route("/profile", get(profile_shortcut))
    }
}

/// `/profile` is protected by default; it lives under the dashboard.
async fn profile_shortcut(State(state): State<AppState>) -> Response {
    let dashboard = state.config.routes.dashboard.trim_end_matches('/');
    see_other(&format!("{}/profile", dashboard), None)
}

async fn home(State(state): State<AppState>) -> Response {
    see_other(&state.config.routes.dashboard, None)
}

/// Credential handed over in the query string by an OAuth return leg.
#[derive(Debug, Deserialize)]
struct HandoverQuery {
    token: Option<String>,
}

/// Either the identity behind the request, or the response to send instead.
async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<User, Response> {
    let routes = &state.config.routes;
    let cookie_name = &state.config.session.cookie_name;
    let Some(token) = request_credential(headers, cookie_name) else {
        return Err(see_other(&routes.sign_in, None));
    };
    match fetch_identity(&state.identity, &token).await {
        Ok(user) => Ok(user),
        Err(ApiError::Unauthorized) => {
            info!(
                event_name = "shell.credential.rejected",
                event_domain = "shell",
                "identity service rejected the credential, signing out"
            );
            Err(see_other(&routes.sign_in, Some(clear_cookie(cookie_name))))
        }
        Err(e) => Err(HTTPError::from(e).into_response()),
    }
}

async fn dashboard_home(
    State(state): State<AppState>,
    Query(query): Query<HandoverQuery>,
    headers: HeaderMap,
) -> Response {
    let routes = &state.config.routes;
    if let Some(token) = query.token.filter(|t| !t.is_empty() && !is_expired(t)) {
        let session = &state.config.session;
        return see_other(
            &routes.dashboard,
            Some(set_cookie(&session.cookie_name, &token, session.retention())),
        );
    }
    match resolve_user(&state, &headers).await {
        Ok(user) => dashboard_page(routes, &user).into_response(),
        Err(response) => response,
    }
}

async fn profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match resolve_user(&state, &headers).await {
        Ok(user) => profile_page(&ProfileView::from(&user)).into_response(),
        Err(response) => response,
    }
}
