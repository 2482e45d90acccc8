use tokio::sync::broadcast;
use uuid::Uuid;

const BUS_CAPACITY: usize = 64;

/// A write to a shared medium, as observed by every client using it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Token store that made the write.
    pub origin: Uuid,
    pub key: String,
    /// False when the key was removed.
    pub present: bool,
}

/// Storage-change notifications shared by all clients over the same mediums.
#[derive(Clone)]
pub struct StorageBus {
    sender: broadcast::Sender<StorageChange>,
}

impl StorageBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, change: StorageChange) {
        // No listeners is fine.
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.sender.subscribe()
    }
}

impl Default for StorageBus {
    fn default() -> Self {
        Self::new()
    }
}
