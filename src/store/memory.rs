//! In-memory snapshot store

use super::SnapshotStore;
use crate::error::Result;
use crate::types::Snapshot;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Keeps the snapshot in process memory
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: RwLock<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn replace(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }
}
