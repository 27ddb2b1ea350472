//! CLI module
//!
//! Command-line interface for the sync server and client.
//!
//! # Commands
//!
//! - `serve` - Start the HTTP sync server
//! - `sync` - Sync against a server, with rate-limit backoff
//! - `show` - Summarize the stored snapshot
//! - `prompt` - Print the assistant system prompt
//! - `refs` - Split the reference block off a generated reply

mod commands;
mod runner;
mod server;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
pub use server::{router, serve, AppState};
