//! Error types for bookmark-sync
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for bookmark-sync
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("{message}")]
    Unauthenticated { message: String },

    // ============================================================================
    // Source Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited by source (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("Rate limited after {attempts} attempts, please try again later")]
    RateLimitExhausted { attempts: u32 },

    #[error("{message}")]
    SourceFailure { status: Option<u16>, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Sync Lifecycle Errors
    // ============================================================================
    #[error("A sync is already in progress")]
    SyncInProgress,

    #[error("Sync cancelled")]
    Cancelled,

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an unauthenticated error
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a source failure carrying the upstream status
    pub fn source_failure(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::SourceFailure {
            status,
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// True when the source throttled us
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Check if this error is worth another attempt after a cooling-off period
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::SourceFailure {
                status: Some(status),
                ..
            } => *status == 429,
            _ => false,
        }
    }

    /// HTTP status to report to a caller for this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Unauthenticated { .. } => Some(401),
            Error::RateLimited { status } => Some(*status),
            Error::SourceFailure { status, .. } => *status,
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for bookmark-sync
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("base_url");
        assert_eq!(err.to_string(), "Missing required config field: base_url");

        let err = Error::unauthenticated("Not authenticated");
        assert_eq!(err.to_string(), "Not authenticated");

        let err = Error::RateLimitExhausted { attempts: 5 };
        assert_eq!(
            err.to_string(),
            "Rate limited after 5 attempts, please try again later"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::RateLimited { status: 429 }.is_retryable());
        assert!(Error::source_failure(Some(429), "slow down").is_retryable());

        assert!(!Error::source_failure(Some(500), "boom").is_retryable());
        assert!(!Error::source_failure(None, "boom").is_retryable());
        assert!(!Error::unauthenticated("nope").is_retryable());
        assert!(!Error::RateLimitExhausted { attempts: 5 }.is_retryable());
        assert!(!Error::config("test").is_retryable());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(Error::unauthenticated("x").status_code(), Some(401));
        assert_eq!(Error::RateLimited { status: 429 }.status_code(), Some(429));
        assert_eq!(
            Error::source_failure(Some(503), "down").status_code(),
            Some(503)
        );
        assert_eq!(Error::source_failure(None, "x").status_code(), None);
        assert_eq!(Error::storage("disk").status_code(), None);
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
