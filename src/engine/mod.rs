//! Sync engine
//!
//! Producer side of a sync request.
//!
//! # Overview
//!
//! The engine runs one walk per request as a spawned producer task that
//! writes [`ProgressRecord`]s into a bounded channel; the HTTP layer drains
//! the other end. The producer suspends only on the page fetch and on the
//! channel send. On success the snapshot is stored before the `done` record
//! goes out, so a client that saw `done` can trust `GET /api/bookmarks`.

use crate::auth::Credential;
use crate::error::Error;
use crate::pagination::CursorWalker;
use crate::protocol::ProgressRecord;
use crate::store::SnapshotStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, Instrument};

/// Default capacity of the progress channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Runs walks and stores their snapshots
#[derive(Clone)]
pub struct SyncEngine {
    walker: CursorWalker,
    store: Arc<dyn SnapshotStore>,
    channel_capacity: usize,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(walker: CursorWalker, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            walker,
            store,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the progress channel capacity
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// The snapshot store
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Spawn a walk and return its progress records as a stream.
    ///
    /// The stream ends right after the terminal record. Dropping it stops
    /// the walk at its next send.
    pub fn start(&self, credential: Credential) -> ReceiverStream<ProgressRecord> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let engine = self.clone();
        let span = tracing::info_span!("sync", user = %credential.user_id());
        tokio::spawn(async move { engine.run(&credential, tx).await }.instrument(span));
        ReceiverStream::new(rx)
    }

    /// Run one walk to completion, ending with exactly one terminal record
    pub async fn run(&self, credential: &Credential, tx: mpsc::Sender<ProgressRecord>) {
        let terminal = match self.walker.walk(credential, &tx).await {
            Ok(walk) => match self.store.replace(&walk.snapshot).await {
                Ok(()) => ProgressRecord::Done(walk.snapshot),
                Err(e) => {
                    error!("Failed to store snapshot: {e}");
                    ProgressRecord::error(e.to_string(), None)
                }
            },
            Err(Error::Cancelled) => {
                info!("Client went away, walk abandoned");
                return;
            }
            Err(e) => ProgressRecord::from_error(&e),
        };

        if tx.send(terminal).await.is_err() {
            info!("Client went away before the terminal record");
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("walker", &self.walker)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
