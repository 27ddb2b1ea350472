//! Page source types and trait

use crate::auth::Credential;
use crate::types::{Author, Item, JsonObject};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One successfully fetched page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items on this page, in source order
    pub items: Vec<Item>,
    /// Author expansions for this page
    pub authors: Vec<Author>,
    /// Continuation cursor; `None` means the source is exhausted
    pub next_cursor: Option<String>,
}

impl Page {
    /// True when this page ends the collection
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none() || self.items.is_empty()
    }
}

/// Result of a single page request
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// A page arrived
    Page(Page),
    /// The source is throttling; do not repeat this call without cooling off
    RateLimited,
    /// Any other non-success answer
    Failure {
        /// Upstream HTTP status, when there was one
        status: Option<u16>,
        /// Human-readable reason
        message: String,
    },
}

impl PageOutcome {
    /// Create a failure outcome
    pub fn failure(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Failure {
            status,
            message: message.into(),
        }
    }
}

/// Fetches one page at a time
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Perform one bounded read starting at `cursor`
    async fn fetch_page(&self, credential: &Credential, cursor: Option<&str>) -> PageOutcome;
}

// ============================================================================
// Wire shape
// ============================================================================

/// Upstream page body: `{data, includes: {users}, meta: {next_token}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPage {
    /// Items; absent on an empty page
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    /// Expansions
    #[serde(default)]
    pub includes: Option<RawIncludes>,
    /// Paging metadata
    #[serde(default)]
    pub meta: Option<RawMeta>,
}

/// Expansions block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIncludes {
    /// Referenced authors
    #[serde(default)]
    pub users: Option<Vec<Value>>,
}

/// Paging metadata block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMeta {
    /// Cursor for the following page
    #[serde(default)]
    pub next_token: Option<String>,
}

impl From<RawPage> for Page {
    fn from(raw: RawPage) -> Self {
        Self {
            items: keyed_entries(raw.data, "item"),
            authors: keyed_entries(raw.includes.and_then(|i| i.users), "author"),
            next_cursor: raw
                .meta
                .and_then(|m| m.next_token)
                .filter(|t| !t.is_empty()),
        }
    }
}

/// Convert raw entries, skipping any without a usable id
fn keyed_entries<T>(entries: Option<Vec<Value>>, kind: &str) -> Vec<T>
where
    T: TryFrom<JsonObject, Error = String>,
{
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| {
            let Value::Object(object) = entry else {
                warn!("Skipping {kind} that is not an object");
                return None;
            };
            T::try_from(object)
                .map_err(|e| warn!("Skipping {kind}: {e}"))
                .ok()
        })
        .collect()
}
