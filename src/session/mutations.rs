use tracing::{info, warn};

use super::{LogoutReason, QueryKey, Session, SessionError, SessionEvent};
use crate::client::{ApiError, AuthResponse, LoginRequest, OAuthExchangeRequest, RegisterRequest};
use crate::forms::{SignInForm, SignUpForm, ValidationErrors};
use crate::models::{AuthProvider, User};

/// Result of a logout. The local session is always gone afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// Whether the identity service confirmed the logout.
    pub remote_acknowledged: bool,
}

impl Session {
    pub async fn login(&self, form: &SignInForm) -> Result<User, SessionError> {
        form.validate().map_err(ApiError::from)?;
        let request = LoginRequest {
            email: form.email.trim().to_string(),
            password: form.password.clone(),
        };
        let result = self.inner.client.login(&request).await;
        self.complete_sign_in("login", result).await
    }

    pub async fn register(&self, form: &SignUpForm) -> Result<User, SessionError> {
        form.validate().map_err(ApiError::from)?;
        let request = RegisterRequest {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            password: form.password.clone(),
        };
        let result = self.inner.client.register(&request).await;
        self.complete_sign_in("register", result).await
    }

    /// Completes the OAuth loop by trading the authorization code.
    pub async fn exchange_oauth_code(
        &self,
        provider: AuthProvider,
        code: &str,
        state: Option<&str>,
    ) -> Result<User, SessionError> {
        if code.trim().is_empty() {
            return Err(
                ApiError::from(ValidationErrors::single("code", "Authorization code is missing"))
                    .into(),
            );
        }
        let request = OAuthExchangeRequest {
            code: code.trim().to_string(),
            state: state.map(str::to_string),
        };
        let result = self.inner.client.exchange_code(provider, &request).await;
        self.complete_sign_in("oauth_exchange", result).await
    }

    /// Where an OAuth button should send the browser.
    pub async fn oauth_authorization_url(
        &self,
        provider: AuthProvider,
    ) -> Result<String, SessionError> {
        Ok(self.inner.client.authorization_url(provider).await?)
    }

    /// Best-effort remote logout; the local session ends regardless.
    pub async fn logout(&self) -> LogoutOutcome {
        let remote_acknowledged = match self.inner.tokens.get().await {
            Some(token) => match self.inner.client.logout(&token).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        event_name = "session.logout.remote_failed",
                        event_domain = "session",
                        error = %e,
                        "remote logout failed, clearing local session anyway"
                    );
                    false
                }
            },
            None => false,
        };
        self.end_locally(LogoutReason::UserInitiated).await;
        info!(
            event_name = "session.logout",
            event_domain = "session",
            remote_acknowledged,
            "signed out"
        );
        LogoutOutcome {
            remote_acknowledged,
        }
    }

    /// Stores the credential and seeds the cache before returning, so the
    /// next `current_user` needs no round trip.
    async fn complete_sign_in(
        &self,
        mutation: &'static str,
        result: Result<AuthResponse, ApiError>,
    ) -> Result<User, SessionError> {
        let AuthResponse { token, user } = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    event_name = "session.mutation.failed",
                    event_domain = "session",
                    mutation,
                    error = %e,
                    "sign-in mutation failed"
                );
                self.inner.tokens.remove().await;
                self.forget_identity();
                return Err(e.into());
            }
        };

        if let Err(e) = self.inner.tokens.set(&token).await {
            self.inner.tokens.remove().await;
            self.forget_identity();
            return Err(e.into());
        }
        self.inner
            .cache
            .set(QueryKey::current_user(), &Some(&user));
        self.inner.cache.invalidate(&QueryKey::user_scope());
        self.inner.events.emit(SessionEvent::LoggedIn {
            user_id: user.id.clone(),
        });
        info!(
            event_name = "session.mutation.succeeded",
            event_domain = "session",
            mutation,
            user_id = user.id.as_str(),
            "signed in"
        );
        Ok(user)
    }
}
