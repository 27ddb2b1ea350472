//! Retry/backoff controller for one sync target

use super::transport::SyncTransport;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::protocol::{ProgressRecord, StreamDecoder, RATE_LIMITED_STATUS};
use crate::store::SnapshotStore;
use crate::types::Snapshot;
use futures::StreamExt;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Observable state of the controller.
///
/// Attempt numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing has run yet
    Idle,
    /// A walk is streaming
    Attempting {
        /// Current attempt
        attempt: u32,
        /// Distinct items reported so far
        synced: usize,
    },
    /// Throttled; counting down to the next attempt
    RateLimitedWaiting {
        /// Attempt that was throttled
        attempt: u32,
        /// Whole seconds left, rounded up
        remaining_secs: u64,
    },
    /// Last sync stored a fresh snapshot
    Succeeded {
        /// Items in the snapshot
        items: usize,
    },
    /// Last sync gave up
    Failed {
        /// Reason shown to the user
        message: String,
        /// Retries ran out while still throttled
        rate_limit_exhausted: bool,
    },
}

impl SyncStatus {
    /// True while a sync is attempting or waiting
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Attempting { .. } | Self::RateLimitedWaiting { .. }
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Attempting { attempt, synced } => {
                write!(f, "syncing (attempt {attempt}): {synced} items")
            }
            Self::RateLimitedWaiting {
                attempt,
                remaining_secs,
            } => write!(
                f,
                "rate limited on attempt {attempt}, retrying in {remaining_secs}s"
            ),
            Self::Succeeded { items } => write!(f, "synced {items} items"),
            Self::Failed { message, .. } => write!(f, "failed: {message}"),
        }
    }
}

/// Runs syncs one at a time, restarting the walk while throttled
pub struct SyncController {
    transport: Arc<dyn SyncTransport>,
    store: Arc<dyn SnapshotStore>,
    retry: RetryConfig,
    status: watch::Sender<SyncStatus>,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncController {
    /// Create a controller
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        store: Arc<dyn SnapshotStore>,
        retry: RetryConfig,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            transport,
            store,
            retry,
            status,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Current status
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// True while a sync holds the controller
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one logical sync to completion.
    ///
    /// Rejects a second concurrent call with [`Error::SyncInProgress`].
    /// Once `cancel` fires no status is published and nothing is stored.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::SyncInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.publish(
                cancel,
                SyncStatus::Attempting {
                    attempt: attempt + 1,
                    synced: 0,
                },
            );

            match self.attempt(attempt + 1, cancel).await {
                Ok(snapshot) => {
                    info!("Sync finished with {} items", snapshot.len());
                    self.publish(
                        cancel,
                        SyncStatus::Succeeded {
                            items: snapshot.len(),
                        },
                    );
                    return Ok(snapshot);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!("Still rate limited after {attempt} attempts, giving up");
                        let err = Error::RateLimitExhausted { attempts: attempt };
                        self.publish(
                            cancel,
                            SyncStatus::Failed {
                                message: err.to_string(),
                                rate_limit_exhausted: true,
                            },
                        );
                        return Err(err);
                    }
                    let delay = self.retry.delay_for_attempt(attempt - 1);
                    warn!(
                        "Rate limited on attempt {}/{}, retrying in {:?}",
                        attempt, max_attempts, delay
                    );
                    self.wait(attempt, delay, cancel).await?;
                }
                Err(e) => {
                    warn!("Sync failed: {e}");
                    self.publish(
                        cancel,
                        SyncStatus::Failed {
                            message: e.to_string(),
                            rate_limit_exhausted: false,
                        },
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Stream one walk; the snapshot is stored only on `done`
    async fn attempt(&self, attempt: u32, cancel: &CancellationToken) -> Result<Snapshot> {
        let mut stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            opened = self.transport.open() => opened?,
        };
        let mut decoder = StreamDecoder::new();

        loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };

            for record in decoder.push(&chunk?) {
                match record {
                    ProgressRecord::Progress(synced) => {
                        self.publish(cancel, SyncStatus::Attempting { attempt, synced });
                    }
                    ProgressRecord::Error {
                        status: Some(RATE_LIMITED_STATUS),
                        ..
                    } => {
                        return Err(Error::RateLimited {
                            status: RATE_LIMITED_STATUS,
                        })
                    }
                    ProgressRecord::Error { message, status } => {
                        return Err(Error::source_failure(status, message))
                    }
                    ProgressRecord::Done(snapshot) => {
                        if cancel.is_cancelled() {
                            return Err(Error::Cancelled);
                        }
                        self.store.replace(&snapshot).await?;
                        return Ok(snapshot);
                    }
                }
            }
        }

        decoder.finish();
        Err(Error::source_failure(
            None,
            "stream ended without a terminal record",
        ))
    }

    /// Count down to the next attempt, publishing once per second
    async fn wait(&self, attempt: u32, delay: Duration, cancel: &CancellationToken) -> Result<()> {
        let deadline = Instant::now() + delay;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let left = deadline - now;
            let remaining_secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            self.publish(
                cancel,
                SyncStatus::RateLimitedWaiting {
                    attempt,
                    remaining_secs,
                },
            );

            let tick = (now + Duration::from_secs(1)).min(deadline);
            tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep_until(tick) => {}
            }
        }
    }

    fn publish(&self, cancel: &CancellationToken, status: SyncStatus) {
        if !cancel.is_cancelled() {
            self.status.send_replace(status);
        }
    }
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("retry", &self.retry)
            .field("status", &*self.status.borrow())
            .field("in_flight", &self.is_busy())
            .finish_non_exhaustive()
    }
}
