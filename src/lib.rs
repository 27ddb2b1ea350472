// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # bookmark-sync
//!
//! Pulls a paginated, rate-limited bookmark collection into a single local
//! snapshot and streams live progress to the client while it does.
//!
//! ## Features
//!
//! - **Cursor walk**: sequential pagination with id dedup and an item cap
//! - **Live progress**: NDJSON records streamed as each page lands
//! - **Backoff**: client restarts throttled walks with capped exponential waits
//! - **Atomic snapshots**: a sync replaces the stored snapshot or leaves it alone
//! - **Reference blocks**: incremental `<<REFS>>...<</REFS>>` scanner for assistant replies
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bookmark_sync::client::{HttpSyncTransport, SyncController};
//! use bookmark_sync::{auth::Credential, config::AppConfig, store::FileSnapshotStore};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> bookmark_sync::Result<()> {
//!     let config = AppConfig::default();
//!     let transport = HttpSyncTransport::new(&config.client, Credential::new("token", "42"))?;
//!     let store = FileSnapshotStore::new(&config.client.snapshot_path);
//!     let controller = SyncController::new(Arc::new(transport), Arc::new(store), config.retry);
//!
//!     let snapshot = controller.sync(&CancellationToken::new()).await?;
//!     println!("{} items", snapshot.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── server ─────────────────────────┐
//! │ PageSource ──> CursorWalker ──mpsc──> encoder ──> NDJSON │
//! │                     │                                    │
//! │                SnapshotStore (replace on done)           │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │ HTTP
//! ┌──────────────────────── client ─────────────────────────┐
//! │ SyncTransport ──> StreamDecoder ──> SyncController       │
//! │                                  (backoff, watch status) │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Application configuration
pub mod config;

/// Bearer credential extraction
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Upstream page source
pub mod source;

/// Cursor walk over the source
pub mod pagination;

/// NDJSON progress protocol
pub mod protocol;

/// Snapshot storage
pub mod store;

/// Server-side sync producer
pub mod engine;

/// Client-side transport and retry controller
pub mod client;

/// Reference block scanner
pub mod refs;

/// Assistant system prompt
pub mod prompt;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use client::{SyncController, SyncStatus};
pub use protocol::{ProgressRecord, StreamDecoder};
pub use refs::{extract_refs, RefExtractor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
