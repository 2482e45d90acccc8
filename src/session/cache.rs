//! Owned query cache with a freshness window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Hierarchical cache key, e.g. `["auth", "me"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryKey(segments.into_iter().map(Into::into).collect())
    }

    /// The session entry: the current identity or null.
    pub fn current_user() -> Self {
        QueryKey::new(["auth", "me"])
    }

    /// Everything scoped to the signed-in user (profile, settings, ...).
    pub fn user_scope() -> Self {
        QueryKey::new(["user"])
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    written_at: Instant,
    invalidated: bool,
}

/// A cached value and whether the next read should refresh it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub stale: bool,
}

/// Query cache owned by a session and handed to whatever needs it.
///
/// Writes are synchronous, so a value written by a mutation is visible to
/// the very next read.
#[derive(Debug)]
pub struct QueryCache {
    stale_after: Duration,
    entries: RwLock<HashMap<QueryKey, Entry>>,
}

impl QueryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<Cached<T>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(Cached {
                value,
                stale: entry.invalidated || entry.written_at.elapsed() >= self.stale_after,
            }),
            Err(e) => {
                warn!(
                    event_name = "session.cache.type_mismatch",
                    event_domain = "session",
                    key = ?key,
                    error = %e,
                    "cached value has an unexpected shape"
                );
                None
            }
        }
    }

    /// Writes fresh data for `key`.
    pub fn set<T: Serialize>(&self, key: QueryKey, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    event_name = "session.cache.serialize_failed",
                    event_domain = "session",
                    key = ?key,
                    error = %e,
                    "value not cached"
                );
                return;
            }
        };
        self.entries.write().insert(
            key,
            Entry {
                value,
                written_at: Instant::now(),
                invalidated: false,
            },
        );
    }

    /// Marks every entry under `prefix` stale; returns how many were marked.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.write();
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                marked += 1;
            }
        }
        marked
    }

    pub fn remove(&self, key: &QueryKey) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
