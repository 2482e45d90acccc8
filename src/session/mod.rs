//! Client-side session: credential lifecycle, the cached identity and the
//! mutations that change them.
//!
//! A [`Session`] owns its token store and shares its [`QueryCache`] with
//! whoever created it. Clones are cheap and refer to the same session.

mod cache;
mod events;
mod mutations;
mod query;
mod watch;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use cache::{Cached, QueryCache, QueryKey};
pub use events::{LogoutReason, SessionEvent, SessionEvents};
pub use mutations::LogoutOutcome;
pub use query::fetch_identity;
pub use watch::StorageWatch;

use crate::client::{ApiError, IdentityClient};
use crate::config::{IdentityConfig, SessionConfig};
use crate::models::User;
use crate::store::{create_token_store, StorageBus, StoreError, TokenStore};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("credential could not be stored: {0}")]
    Storage(#[from] StoreError),
}

impl SessionError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SessionError::Api(ApiError::Unauthorized))
    }
}

/// Retry and recovery knobs of the session query.
#[derive(Debug, Clone)]
struct QueryPolicy {
    max_retries: u32,
    retry_base_delay: Duration,
    refresh_on_unauthorized: bool,
}

struct Inner {
    client: IdentityClient,
    tokens: TokenStore,
    cache: Arc<QueryCache>,
    events: SessionEvents,
    policy: QueryPolicy,
    refreshing: AtomicBool,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(
        client: IdentityClient,
        tokens: TokenStore,
        cache: Arc<QueryCache>,
        config: &SessionConfig,
    ) -> Self {
        Session {
            inner: Arc::new(Inner {
                client,
                tokens,
                cache,
                events: SessionEvents::new(),
                policy: QueryPolicy {
                    max_retries: config.max_retries,
                    retry_base_delay: config.retry_base_delay(),
                    refresh_on_unauthorized: config.refresh_on_unauthorized,
                },
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Wires a session over the configured file and cookie mediums with a
    /// fresh cache. Sessions that should observe each other share `bus`.
    pub fn from_config(
        identity: &IdentityConfig,
        config: &SessionConfig,
        bus: StorageBus,
    ) -> Result<Self, ApiError> {
        let client = IdentityClient::new(identity)?;
        let tokens = create_token_store(config, bus);
        let cache = Arc::new(QueryCache::new(config.stale_after()));
        Ok(Session::new(client, tokens, cache, config))
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.inner.cache
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn client(&self) -> &IdentityClient {
        &self.inner.client
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    /// Drops the credential and the cached identity, leaving the session
    /// cache holding null.
    async fn end_locally(&self, reason: LogoutReason) {
        self.inner.tokens.remove().await;
        self.forget_identity();
        self.inner.events.emit(SessionEvent::LoggedOut { reason });
    }

    fn forget_identity(&self) {
        self.inner.cache.clear();
        self.inner
            .cache
            .set(QueryKey::current_user(), &None::<User>);
    }
}
