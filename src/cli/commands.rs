//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bookmark sync CLI
#[derive(Parser, Debug)]
#[command(name = "bookmark-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the sync server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Sync against a running server, retrying while rate limited
    Sync {
        /// Bearer token (falls back to BOOKMARK_SYNC_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// Owner of the token (falls back to BOOKMARK_SYNC_USER_ID)
        #[arg(long)]
        user_id: Option<String>,

        /// Server root URL (overrides config)
        #[arg(long)]
        server_url: Option<String>,
    },

    /// Summarize the stored snapshot
    Show {
        /// Read the server's snapshot instead of the client copy
        #[arg(long)]
        server: bool,
    },

    /// Print the assistant system prompt for the stored snapshot
    Prompt {
        /// Read the server's snapshot instead of the client copy
        #[arg(long)]
        server: bool,
    },

    /// Read a generated reply from stdin and split off its reference block
    Refs,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Pretty,
}
