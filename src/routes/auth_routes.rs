//! Sign-in, sign-up, OAuth and logout pages.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::{info, warn};

use super::request_credential;
use crate::client::{ApiError, AuthResponse, LoginRequest, OAuthExchangeRequest, RegisterRequest};
use crate::config::RoutesConfig;
use crate::forms::{safe_redirect, SignInForm, SignUpForm, ValidationErrors};
use crate::models::{is_expired, AuthProvider};
use crate::state::AppState;
use crate::store::cookie_store::{clear_cookie, set_cookie};
use crate::utils::http_helpers::see_other;
use crate::views::{error_page, sign_in_page, sign_up_page, FormState};

const OAUTH_FAILED: &str = "oauth_failed";

/// Registers the authentication pages under the configured paths.
pub fn routes(paths: &RoutesConfig) -> Router<AppState> {
    Router::new()
        .route(&paths.sign_in, get(sign_in_form).post(sign_in))
        .route(&paths.sign_up, get(sign_up_form).post(sign_up))
        .route("/auth/oauth/:provider", get(oauth_start))
        .route(&paths.oauth_callback, get(oauth_callback))
        .route("/auth/logout", post(logout))
}

/// Status and form-wide message for a failed sign-in or sign-up call.
fn describe_failure(err: &ApiError) -> (StatusCode, String) {
    let message = match err {
        ApiError::Unauthorized => "Invalid email or password".to_string(),
        ApiError::Validation(_) => "Please correct the highlighted fields".to_string(),
        ApiError::Server { message, .. } => message.clone(),
        ApiError::Network(_) | ApiError::Decode(_) => {
            "The identity service is unavailable, please try again".to_string()
        }
    };
    let status = match err {
        ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, message)
}

fn signed_in(state: &AppState, auth: &AuthResponse, target: &str) -> Response {
    let session = &state.config.session;
    see_other(
        target,
        Some(set_cookie(&session.cookie_name, &auth.token, session.retention())),
    )
}

async fn sign_in_form(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let routes = &state.config.routes;
    let message = (query.get("error").map(String::as_str) == Some(OAUTH_FAILED))
        .then_some("Signing in with Google failed, please try again");
    sign_in_page(
        routes,
        &FormState {
            callback_url: query.get(&routes.callback_param).map(String::as_str),
            message,
            ..FormState::default()
        },
    )
    .into_response()
}

async fn sign_in(State(state): State<AppState>, Form(form): Form<SignInForm>) -> Response {
    let routes = &state.config.routes;
    let render = |status: StatusCode, errors: Option<&ValidationErrors>, message: Option<&str>| {
        let page = sign_in_page(
            routes,
            &FormState {
                email: &form.email,
                callback_url: form.callback_url.as_deref(),
                errors,
                message,
                ..FormState::default()
            },
        );
        (status, page).into_response()
    };

    if let Err(errors) = form.validate() {
        return render(StatusCode::UNPROCESSABLE_ENTITY, Some(&errors), None);
    }

    let request = LoginRequest {
        email: form.email.trim().to_string(),
        password: form.password.clone(),
    };
    match state.identity.login(&request).await {
        Ok(auth) => {
            info!(
                event_name = "shell.sign_in.succeeded",
                event_domain = "shell",
                user_id = auth.user.id.as_str(),
                "signed in"
            );
            let target = safe_redirect(form.callback_url.as_deref(), &routes.dashboard);
            signed_in(&state, &auth, target)
        }
        Err(e) => {
            warn!(
                event_name = "shell.sign_in.failed",
                event_domain = "shell",
                error = %e,
                "sign-in rejected"
            );
            let (status, message) = describe_failure(&e);
            let errors = match &e {
                ApiError::Validation(errors) => Some(errors),
                _ => None,
            };
            render(status, errors, Some(message.as_str()))
        }
    }
}

async fn sign_up_form(State(state): State<AppState>) -> Response {
    sign_up_page(&state.config.routes, &FormState::default()).into_response()
}

async fn sign_up(State(state): State<AppState>, Form(form): Form<SignUpForm>) -> Response {
    let routes = &state.config.routes;
    let render = |status: StatusCode, errors: Option<&ValidationErrors>, message: Option<&str>| {
        let page = sign_up_page(
            routes,
            &FormState {
                name: &form.name,
                email: &form.email,
                errors,
                message,
                ..FormState::default()
            },
        );
        (status, page).into_response()
    };

    if let Err(errors) = form.validate() {
        return render(StatusCode::UNPROCESSABLE_ENTITY, Some(&errors), None);
    }

    let request = RegisterRequest {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password.clone(),
    };
    match state.identity.register(&request).await {
        Ok(auth) => {
            info!(
                event_name = "shell.sign_up.succeeded",
                event_domain = "shell",
                user_id = auth.user.id.as_str(),
                "account created"
            );
            signed_in(&state, &auth, &routes.dashboard)
        }
        Err(e) => {
            warn!(
                event_name = "shell.sign_up.failed",
                event_domain = "shell",
                error = %e,
                "sign-up rejected"
            );
            let (status, message) = describe_failure(&e);
            let errors = match &e {
                ApiError::Validation(errors) => Some(errors),
                _ => None,
            };
            render(status, errors, Some(message.as_str()))
        }
    }
}

/// Sends the browser to the provider's authorization page.
async fn oauth_start(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    let Some(provider) = AuthProvider::oauth(&provider) else {
        return (
            StatusCode::NOT_FOUND,
            error_page("Unknown provider", "This sign-in method is not available."),
        )
            .into_response();
    };
    match state.identity.authorization_url(provider).await {
        Ok(url) => see_other(&url, None),
        Err(e) => {
            warn!(
                event_name = "shell.oauth.authorization_url_failed",
                event_domain = "shell",
                provider = provider.as_str(),
                error = %e,
                "could not start oauth"
            );
            (
                StatusCode::BAD_GATEWAY,
                error_page("Sign-in unavailable", "Please try again in a moment."),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    token: Option<String>,
    error: Option<String>,
    provider: Option<String>,
}

/// Return leg of the OAuth loop. Accepts either an authorization code to
/// exchange or a credential the identity service already issued.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let routes = &state.config.routes;
    let failed = || see_other(&format!("{}?error={}", routes.sign_in, OAUTH_FAILED), None);

    if let Some(error) = query.error.as_deref() {
        warn!(
            event_name = "shell.oauth.provider_error",
            event_domain = "shell",
            error,
            "provider reported an error"
        );
        return failed();
    }

    if let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) {
        if is_expired(token) {
            return failed();
        }
        let session = &state.config.session;
        return see_other(
            &routes.dashboard,
            Some(set_cookie(&session.cookie_name, token, session.retention())),
        );
    }

    let (Some(code), Some(provider)) = (
        query.code.filter(|c| !c.is_empty()),
        AuthProvider::oauth(query.provider.as_deref().unwrap_or("google")),
    ) else {
        return failed();
    };

    let request = OAuthExchangeRequest {
        code,
        state: query.state,
    };
    match state.identity.exchange_code(provider, &request).await {
        Ok(auth) => {
            info!(
                event_name = "shell.oauth.succeeded",
                event_domain = "shell",
                provider = provider.as_str(),
                user_id = auth.user.id.as_str(),
                "signed in with oauth"
            );
            signed_in(&state, &auth, &routes.dashboard)
        }
        Err(e) => {
            warn!(
                event_name = "shell.oauth.exchange_failed",
                event_domain = "shell",
                provider = provider.as_str(),
                error = %e,
                "code exchange failed"
            );
            failed()
        }
    }
}

/// Remote logout is best effort; the cookie is cleared regardless.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie_name = &state.config.session.cookie_name;
    if let Some(token) = request_credential(&headers, cookie_name) {
        if let Err(e) = state.identity.logout(&token).await {
            warn!(
                event_name = "shell.logout.remote_failed",
                event_domain = "shell",
                error = %e,
                "remote logout failed, clearing cookie anyway"
            );
        }
    }
    see_other(&state.config.routes.sign_in, Some(clear_cookie(cookie_name)))
}
