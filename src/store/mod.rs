pub mod base;
pub mod bus;
pub mod cookie_store;
pub mod file_store;
pub mod memory_store;
pub mod token_store;

use std::sync::Arc;

use tracing::info;

pub use base::{Medium, StoreError};
pub use bus::{StorageBus, StorageChange};
pub use cookie_store::CookieJar;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use token_store::TokenStore;

use crate::config::SessionConfig;

/// Builds the client-side token store: the durable key-value file as the
/// primary medium and a cookie jar as the secondary.
///
/// Clients that should see each other's logins and logouts must share `bus`.
pub fn create_token_store(config: &SessionConfig, bus: StorageBus) -> TokenStore {
    info!(
        event_name = "store.token.created",
        event_domain = "store",
        path = %config.storage_path.display(),
        retention_days = config.retention_days,
        "token store over file and cookie mediums"
    );
    TokenStore::new(
        Arc::new(FileStore::new(&config.storage_path)),
        Arc::new(CookieJar::new()),
        config.storage_key.clone(),
        config.retention(),
        bus,
    )
}
