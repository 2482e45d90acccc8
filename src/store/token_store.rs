use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::base::{Medium, StoreError};
use super::bus::{StorageBus, StorageChange};
use crate::models::token;

/// Persists the bearer credential redundantly in two mediums under one key.
///
/// The primary medium is authoritative for writes; the secondary is a copy
/// kept for readers that only see that medium (e.g. cookie-only edge logic).
pub struct TokenStore {
    primary: Arc<dyn Medium>,
    secondary: Arc<dyn Medium>,
    key: String,
    retention: Duration,
    bus: StorageBus,
    origin: Uuid,
}

impl TokenStore {
    pub fn new(
        primary: Arc<dyn Medium>,
        secondary: Arc<dyn Medium>,
        key: impl Into<String>,
        retention: Duration,
        bus: StorageBus,
    ) -> Self {
        Self {
            primary,
            secondary,
            key: key.into(),
            retention,
            bus,
            origin: Uuid::new_v4(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Identifies this store's writes on the storage bus.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn bus(&self) -> &StorageBus {
        &self.bus
    }

    /// Persists `token` to both mediums.
    ///
    /// Failing to write the primary medium is an error; the secondary copy
    /// is best effort.
    pub async fn set(&self, token: &str) -> Result<(), StoreError> {
        self.primary.set(&self.key, token, self.retention).await?;
        if let Err(e) = self.secondary.set(&self.key, token, self.retention).await {
            warn!(
                event_name = "store.token.secondary.write_failed",
                event_domain = "store",
                medium = self.secondary.name(),
                error = %e,
                "credential copy not written"
            );
        }
        debug!(
            event_name = "store.token.set",
            event_domain = "store",
            retention_secs = self.retention.as_secs(),
            "credential stored"
        );
        self.publish(true);
        Ok(())
    }

    /// Reads the primary medium, falling back to the secondary.
    /// Unreadable mediums count as empty.
    pub async fn get(&self) -> Option<String> {
        for medium in [&self.primary, &self.secondary] {
            match medium.get(&self.key).await {
                Ok(Some(token)) => return Some(token),
                Ok(None) => {}
                Err(e) => warn!(
                    event_name = "store.token.read_failed",
                    event_domain = "store",
                    medium = medium.name(),
                    error = %e,
                    "credential medium unreadable"
                ),
            }
        }
        None
    }

    /// Clears both mediums.
    pub async fn remove(&self) {
        for medium in [&self.primary, &self.secondary] {
            if let Err(e) = medium.remove(&self.key).await {
                warn!(
                    event_name = "store.token.remove_failed",
                    event_domain = "store",
                    medium = medium.name(),
                    error = %e,
                    "credential not removed from medium"
                );
            }
        }
        debug!(
            event_name = "store.token.removed",
            event_domain = "store",
            "credential removed"
        );
        self.publish(false);
    }

    /// The stored credential if it has not expired. An expired credential
    /// found here is removed.
    pub async fn valid_token(&self) -> Option<String> {
        let token = self.get().await?;
        if Self::is_expired(&token) {
            debug!(
                event_name = "store.token.expired",
                event_domain = "store",
                "stored credential expired, discarding"
            );
            self.remove().await;
            return None;
        }
        Some(token)
    }

    /// Undecodable credentials count as expired.
    pub fn is_expired(token: &str) -> bool {
        token::is_expired(token)
    }

    fn publish(&self, present: bool) {
        self.bus.publish(StorageChange {
            origin: self.origin,
            key: self.key.clone(),
            present,
        });
    }
}
