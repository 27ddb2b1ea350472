//! Application configuration
//!
//! Loaded from an optional YAML file, then overridden from `BOOKMARK_SYNC_*`
//! environment variables. Every field has a default, so an empty file is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest page the upstream source will hand out per call
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upstream source settings
    pub source: SourceConfig,
    /// HTTP server settings
    pub server: ServerSettings,
    /// Snapshot storage settings
    pub storage: StorageConfig,
    /// Client-side retry settings
    pub retry: RetryConfig,
    /// Client settings
    pub client: ClientConfig,
}

impl AppConfig {
    /// Load config from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse config from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BOOKMARK_SYNC_BASE_URL") {
            self.source.base_url = v;
        }
        if let Some(v) = lookup("BOOKMARK_SYNC_MAX_ITEMS") {
            self.source.max_items = parse_env("BOOKMARK_SYNC_MAX_ITEMS", &v)?;
        }
        if let Some(v) = lookup("BOOKMARK_SYNC_PORT") {
            self.server.port = parse_env("BOOKMARK_SYNC_PORT", &v)?;
        }
        if let Some(v) = lookup("BOOKMARK_SYNC_SNAPSHOT_PATH") {
            self.storage.snapshot_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("BOOKMARK_SYNC_SERVER_URL") {
            self.client.server_url = v;
        }
        Ok(())
    }

    /// Reject settings the sync cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.source.base_url.is_empty() {
            return Err(Error::missing_field("source.base_url"));
        }
        url::Url::parse(&self.source.base_url)?;
        if self.source.page_size == 0 || self.source.page_size > MAX_PAGE_SIZE {
            return Err(Error::config(format!(
                "source.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.source.max_items == 0 {
            return Err(Error::config("source.max_items must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be positive"));
        }
        if self.retry.base_delay_secs > self.retry.max_delay_secs {
            return Err(Error::config(
                "retry.base_delay_secs must not exceed retry.max_delay_secs",
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("Invalid value for {key}: {value}")))
}

// ============================================================================
// Sections
// ============================================================================

/// Upstream source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// API root, without the `/users/...` suffix
    pub base_url: String,
    /// Items requested per page
    pub page_size: u32,
    /// Walk stops once this many distinct items are collected
    pub max_items: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Optional client-side pacing of page requests
    pub requests_per_minute: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com/2".to_string(),
            page_size: MAX_PAGE_SIZE,
            max_items: 500,
            timeout_secs: 30,
            requests_per_minute: None,
        }
    }
}

impl SourceConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File holding the single snapshot
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/bookmarks.json"),
        }
    }
}

/// Backoff settings for rate-limited sync attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First wait, doubled on every further attempt
    pub base_delay_secs: u64,
    /// Upper bound of a single wait
    pub max_delay_secs: u64,
    /// Total attempts before giving up
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 3,
            max_delay_secs: 30,
            max_attempts: 5,
        }
    }
}

impl RetryConfig {
    /// Wait before retrying after `attempt` (0-indexed) was rate limited.
    ///
    /// `min(base * 2^attempt, max)`, no jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let secs = self
            .base_delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL of the sync server
    pub server_url: String,
    /// Where the client keeps its own copy of the last snapshot
    pub snapshot_path: PathBuf,
    /// Upper bound for one whole streamed attempt, in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            snapshot_path: PathBuf::from("data/client-bookmarks.json"),
            timeout_secs: 600,
        }
    }
}

impl ClientConfig {
    /// Attempt timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
