//! File-backed snapshot store

use super::SnapshotStore;
use crate::error::{Error, Result};
use crate::types::Snapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Snapshot persisted as one JSON file
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    /// Serializes writers so two replaces never share a temp file
    write_lock: Mutex<()>,
}

impl FileSnapshotStore {
    /// Create a store at the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to read snapshot {}: {e}",
                    self.path.display()
                )))
            }
        };

        let snapshot = serde_json::from_str(&contents).map_err(|e| {
            Error::storage(format!(
                "Failed to parse snapshot {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(snapshot))
    }

    async fn replace(&self, snapshot: &Snapshot) -> Result<()> {
        let contents = serde_json::to_string_pretty(snapshot)
            .map_err(|e| Error::storage(format!("Failed to serialize snapshot: {e}")))?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::storage(format!("Failed to write snapshot: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::storage(format!("Failed to rename snapshot: {e}")))?;

        debug!(
            "Stored snapshot of {} items at {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}
