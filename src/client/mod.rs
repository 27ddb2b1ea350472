//! Sync client
//!
//! Consumer side of a sync: opens the progress stream, decodes it and
//! retries the whole walk with exponential backoff while the source keeps
//! throttling.
//!
//! # State machine
//!
//! ```text
//! Idle ──> Attempting ──> Succeeded
//!              │  ▲
//!              │  └── RateLimitedWaiting (countdown, then restart)
//!              └────> Failed (fatal error or retries exhausted)
//! ```

mod controller;
mod transport;

pub use controller::{SyncController, SyncStatus};
pub use transport::{ByteStream, HttpSyncTransport, SyncTransport, SYNC_PATH};
