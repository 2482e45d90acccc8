#[allow(unused_imports)]
use cached::proc_macro::cached;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::types::{
    AuthResponse, AuthorizationUrlResponse, ErrorBody, LoginRequest, MeResponse,
    OAuthExchangeRequest, RefreshResponse, RegisterRequest,
};
use crate::config::IdentityConfig;
use crate::models::{AuthProvider, User};

/// Client for the remote identity service.
///
/// Stateless: every authenticated call takes the bearer credential
/// explicitly, so the caller decides where credentials live.
#[derive(Clone, Debug)]
pub struct IdentityClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl IdentityClient {
    pub fn new(config: &IdentityConfig) -> Result<Self, ApiError> {
        let timeout = Duration::from_millis(config.timeout_in_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;
        info!(
            event_name = "client.identity.created",
            event_domain = "client",
            base_url = config.base_url.as_str(),
            timeout_in_ms = config.timeout_in_ms,
            "identity client ready"
        );
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        debug!(
            event_name = "client.identity.register",
            event_domain = "client",
            "registering account"
        );
        send_json(self.http.post(self.url("/auth/register")).json(request)).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        debug!(
            event_name = "client.identity.login",
            event_domain = "client",
            "logging in"
        );
        send_json(self.http.post(self.url("/auth/login")).json(request)).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        debug!(
            event_name = "client.identity.logout",
            event_domain = "client",
            "logging out"
        );
        let response = send(self.http.post(self.url("/auth/logout")).bearer_auth(token)).await?;
        check_status(response).await.map(|_| ())
    }

    /// Fetches the identity behind `token`.
    pub async fn me(&self, token: &str) -> Result<User, ApiError> {
        let me: MeResponse =
            send_json(self.http.get(self.url("/auth/me")).bearer_auth(token)).await?;
        Ok(me.into_user())
    }

    /// Trades a still-accepted credential for a fresh one.
    pub async fn refresh(&self, token: &str) -> Result<String, ApiError> {
        debug!(
            event_name = "client.identity.refresh",
            event_domain = "client",
            "refreshing credential"
        );
        let refreshed: RefreshResponse =
            send_json(self.http.post(self.url("/auth/refresh")).bearer_auth(token)).await?;
        Ok(refreshed.token)
    }

    /// External authorization URL the OAuth button sends the browser to.
    pub async fn authorization_url(&self, provider: AuthProvider) -> Result<String, ApiError> {
        fetch_authorization_url(
            self.base_url.clone(),
            provider.as_str().to_string(),
            self.timeout.as_millis() as u64,
        )
        .await
    }

    /// Exchanges an OAuth authorization code for a credential.
    pub async fn exchange_code(
        &self,
        provider: AuthProvider,
        request: &OAuthExchangeRequest,
    ) -> Result<AuthResponse, ApiError> {
        debug!(
            event_name = "client.identity.oauth.exchange",
            event_domain = "client",
            provider = provider.as_str(),
            "exchanging authorization code"
        );
        let path = format!("/auth/oauth/{}/callback", provider.as_str());
        send_json(self.http.post(self.url(&path)).json(request)).await
    }
}

/// Authorization URLs only change with the service's OAuth setup, so they are
/// memoized per service and provider for five minutes.
#[cfg_attr(not(test), cached(time = 300, result = true))]
async fn fetch_authorization_url(
    base_url: String,
    provider: String,
    timeout_in_ms: u64,
) -> Result<String, ApiError> {
    debug!(
        event_name = "client.identity.oauth.url",
        event_domain = "client",
        provider = provider.as_str(),
        "fetching authorization url"
    );
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_in_ms))
        .build()
        .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;
    let url = format!("{}/auth/oauth/{}/url", base_url, provider);
    let response: AuthorizationUrlResponse = send_json(http.get(url)).await?;
    Ok(response.url)
}

async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    request.send().await.map_err(|e| {
        warn!(
            event_name = "client.identity.transport.error",
            event_domain = "client",
            error = %e,
            "identity service unreachable"
        );
        ApiError::Network(e.to_string())
    })
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = check_status(send(request).await?).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(format!("Failed to parse identity response: {}", e)))
}

/// Maps non-success statuses into `ApiError`.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::text)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or(body);
    debug!(
        event_name = "client.identity.status.error",
        event_domain = "client",
        status = status.as_u16(),
        message = message.as_str(),
        "identity service rejected request"
    );
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}
