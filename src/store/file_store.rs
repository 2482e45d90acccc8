use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::base::{Medium, StoreError, StoredValue};

type Entries = HashMap<String, StoredValue>;

/// Durable key-value medium backed by a single JSON file.
///
/// Several stores may point at the same file (one per open client); each
/// operation re-reads the file, so the last writer wins. Every write goes
/// through its own temp file, so concurrent writers never trip over each
/// other's rename.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Entries::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like `load`, but unreadable contents count as empty so the next write
    /// replaces them instead of failing forever.
    async fn load_for_write(&self) -> Result<Entries, StoreError> {
        match self.load().await {
            Err(StoreError::Serialization(e)) => {
                warn!(
                    event_name = "store.file.corrupt",
                    event_domain = "store",
                    path = %self.path.display(),
                    error = %e,
                    "storage file unreadable, overwriting"
                );
                Ok(Entries::new())
            }
            other => other,
        }
    }

    /// Writes through a uniquely named sibling temp file so readers never see
    /// a torn file.
    async fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "storage".to_string());
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Medium for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.load().await?;
        Ok(entries
            .get(key)
            .filter(|stored| stored.is_live())
            .map(|stored| stored.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, retention: Duration) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_for_write().await?;
        entries.retain(|_, stored| stored.is_live());
        entries.insert(key.to_string(), StoredValue::new(value, retention));
        self.save(&entries).await?;
        debug!(
            event_name = "store.file.set",
            event_domain = "store",
            path = %self.path.display(),
            key,
            "value persisted"
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_for_write().await?;
        if entries.remove(key).is_some() {
            self.save(&entries).await?;
        }
        Ok(())
    }
}
