use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{LogoutReason, QueryKey, Session, SessionEvent};
use crate::store::StorageChange;

/// Handle on a running storage watch. Dropping it stops the watch.
pub struct StorageWatch {
    handle: Option<JoinHandle<()>>,
}

impl StorageWatch {
    /// Stops the watch and waits for its task to finish.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for StorageWatch {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Session {
    /// Follows credential writes made by other sessions over the same
    /// storage. A removal there logs this session out locally; a new
    /// credential marks the cached identity stale. Last writer wins.
    ///
    /// Meant to be started once by the application shell.
    pub fn watch_storage(&self) -> StorageWatch {
        let mut changes = self.inner.tokens.bus().subscribe();
        let session = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => session.apply_storage_change(change),
                    Err(RecvError::Lagged(skipped)) => warn!(
                        event_name = "session.storage_watch.lagged",
                        event_domain = "session",
                        skipped,
                        "missed storage notifications"
                    ),
                    Err(RecvError::Closed) => break,
                }
            }
        });
        StorageWatch {
            handle: Some(handle),
        }
    }

    fn apply_storage_change(&self, change: StorageChange) {
        let tokens = &self.inner.tokens;
        if change.origin == tokens.origin() || change.key != tokens.key() {
            return;
        }
        debug!(
            event_name = "session.storage_watch.change",
            event_domain = "session",
            origin = %change.origin,
            present = change.present,
            "credential changed elsewhere"
        );
        if change.present {
            self.inner.cache.invalidate(&QueryKey::current_user());
        } else {
            // The credential is already gone from the shared mediums; only
            // local state is dropped, so nothing is published back.
            self.forget_identity();
            self.inner.events.emit(SessionEvent::LoggedOut {
                reason: LogoutReason::ExternalRemoval,
            });
        }
    }
}
