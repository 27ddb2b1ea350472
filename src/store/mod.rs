//! Snapshot storage
//!
//! One snapshot per deployment, under a fixed name. Writes replace the whole
//! snapshot atomically; readers never observe a half-written one.

mod file;
mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

use crate::error::Result;
use crate::types::Snapshot;
use async_trait::async_trait;

/// Read/replace access to the stored snapshot
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The stored snapshot, or `None` if nothing was ever synced
    async fn load(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot wholesale
    async fn replace(&self, snapshot: &Snapshot) -> Result<()>;
}
