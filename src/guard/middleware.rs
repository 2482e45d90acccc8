use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::rules::{GuardDecision, GuardRequest};
use crate::state::AppState;
use crate::store::cookie_store::{clear_cookie, read_cookie};
use crate::utils::http_helpers::see_other;

/// The token of an `Authorization: Bearer` header, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Applies the route guard to every request before it reaches a handler.
pub async fn route_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let rules = &state.rules;
    let cookie_token = read_cookie(request.headers(), rules.cookie_name());
    let bearer_token = bearer_token(request.headers());

    let decision = rules.evaluate(&GuardRequest {
        path: request.uri().path(),
        query: request.uri().query(),
        cookie_token: cookie_token.as_deref(),
        bearer_token,
    });

    match decision {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::Redirect {
            location,
            clear_cookie: clear,
        } => {
            debug!(
                event_name = "guard.redirect",
                event_domain = "guard",
                path = request.uri().path(),
                location = location.as_str(),
                clear_cookie = clear,
                "request redirected"
            );
            let cookie = clear.then(|| clear_cookie(rules.cookie_name()));
            see_other(&location, cookie)
        }
    }
}
