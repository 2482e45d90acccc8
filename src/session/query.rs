use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{LogoutReason, QueryKey, Session, SessionError, SessionEvent};
use crate::client::{ApiError, IdentityClient};
use crate::models::{decode_claims, User};
use crate::utils::log_throttle::should_emit;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const REFRESH_FAILURE_LOG_WINDOW: Duration = Duration::from_secs(60);

/// Fetches the identity behind `token`.
///
/// When the service fails for any reason other than rejecting the
/// credential, an identity is synthesized from the token's own (unverified)
/// claims before giving up.
pub async fn fetch_identity(client: &IdentityClient, token: &str) -> Result<User, ApiError> {
    match client.me(token).await {
        Ok(user) => Ok(user),
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized),
        Err(e) => match decode_claims(token).as_ref().and_then(User::from_claims) {
            Some(user) => {
                warn!(
                    event_name = "session.identity.claims_fallback",
                    event_domain = "session",
                    user_id = user.id.as_str(),
                    error = %e,
                    "identity service failed, using credential claims"
                );
                Ok(user)
            }
            None => Err(e),
        },
    }
}

fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

impl Session {
    /// The current identity, or `None` when signed out.
    ///
    /// Without a valid credential nothing is fetched. A fresh cached
    /// identity is returned as is; a stale one is returned while a refresh
    /// runs in the background.
    pub async fn current_user(&self) -> Result<Option<User>, SessionError> {
        let Some(token) = self.inner.tokens.valid_token().await else {
            self.inner
                .cache
                .set(QueryKey::current_user(), &None::<User>);
            return Ok(None);
        };

        if let Some(cached) = self
            .inner
            .cache
            .get::<Option<User>>(&QueryKey::current_user())
        {
            // A cached null next to a valid credential means another client
            // signed in; treat it as a miss.
            if let Some(user) = cached.value {
                if cached.stale {
                    self.spawn_background_refresh();
                }
                return Ok(Some(user));
            }
        }

        self.load_user(token).await
    }

    /// Trades the stored credential for a fresh one.
    ///
    /// Returns `Ok(false)` when there was nothing to refresh or the service
    /// rejected the credential, in which case the session has ended.
    pub async fn refresh(&self) -> Result<bool, SessionError> {
        let Some(token) = self.inner.tokens.valid_token().await else {
            return Ok(false);
        };
        match self.inner.client.refresh(&token).await {
            Ok(refreshed) => {
                self.inner.tokens.set(&refreshed).await?;
                self.inner.cache.invalidate(&QueryKey::current_user());
                self.inner.events.emit(SessionEvent::TokenRefreshed);
                Ok(true)
            }
            Err(ApiError::Unauthorized) => {
                self.end_locally(LogoutReason::Unauthorized).await;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(super) async fn load_user(&self, token: String) -> Result<Option<User>, SessionError> {
        match self.fetch_with_retry(&token).await {
            Ok(user) => {
                self.inner
                    .cache
                    .set(QueryKey::current_user(), &Some(&user));
                Ok(Some(user))
            }
            Err(ApiError::Unauthorized) => self.recover_unauthorized(&token).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Bounded retries with exponential backoff; a rejected credential is
    /// never retried.
    async fn fetch_with_retry(&self, token: &str) -> Result<User, ApiError> {
        let policy = &self.inner.policy;
        let mut attempt = 0;
        loop {
            match fetch_identity(&self.inner.client, token).await {
                Ok(user) => return Ok(user),
                Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized),
                Err(e) if attempt < policy.max_retries => {
                    let delay = retry_delay(policy.retry_base_delay, attempt);
                    debug!(
                        event_name = "session.identity.retry",
                        event_domain = "session",
                        attempt = attempt + 1,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying identity fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Optionally refreshes once; otherwise the session ends and every
    /// subscriber hears about it.
    async fn recover_unauthorized(&self, token: &str) -> Result<Option<User>, SessionError> {
        if self.inner.policy.refresh_on_unauthorized {
            if let Ok(refreshed) = self.inner.client.refresh(token).await {
                self.inner.tokens.set(&refreshed).await?;
                self.inner.events.emit(SessionEvent::TokenRefreshed);
                match fetch_identity(&self.inner.client, &refreshed).await {
                    Ok(user) => {
                        self.inner
                            .cache
                            .set(QueryKey::current_user(), &Some(&user));
                        return Ok(Some(user));
                    }
                    Err(ApiError::Unauthorized) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        info!(
            event_name = "session.credential.rejected",
            event_domain = "session",
            "credential rejected by identity service, signing out"
        );
        self.end_locally(LogoutReason::Unauthorized).await;
        Ok(None)
    }

    fn spawn_background_refresh(&self) {
        if self.inner.refreshing.swap(true, Ordering::AcqRel) {
            return;
        }
        let session = self.clone();
        tokio::spawn(async move {
            let outcome = match session.inner.tokens.valid_token().await {
                Some(token) => session.load_user(token).await.map(|_| ()),
                None => {
                    session.forget_identity();
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                if let Some(suppressed_count) = should_emit(
                    "session.identity.background_refresh.failed",
                    REFRESH_FAILURE_LOG_WINDOW,
                ) {
                    warn!(
                        event_name = "session.identity.background_refresh.failed",
                        event_domain = "session",
                        suppressed_count,
                        error = %e,
                        "keeping stale identity"
                    );
                }
            }
            session.inner.refreshing.store(false, Ordering::Release);
        });
    }
}
