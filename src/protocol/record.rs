//! Progress records and their line encoding

use crate::error::Error;
use crate::types::Snapshot;
use bytes::Bytes;
use futures::{future, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Media type of the progress stream
pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// `status` carried by an error record when the source throttled the walk
pub const RATE_LIMITED_STATUS: u16 = 429;

/// One line of the progress stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord", into = "WireRecord")]
pub enum ProgressRecord {
    /// Distinct items collected so far
    Progress(usize),
    /// Terminal failure
    Error {
        /// Human-readable reason
        message: String,
        /// HTTP status behind the failure, if any
        status: Option<u16>,
    },
    /// Terminal success carrying the full snapshot
    Done(Snapshot),
}

impl ProgressRecord {
    /// Create an error record
    pub fn error(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Error {
            message: message.into(),
            status,
        }
    }

    /// The terminal record for a walk that was throttled
    pub fn rate_limited() -> Self {
        Self::error("Rate limited", Some(RATE_LIMITED_STATUS))
    }

    /// Map a walk-ending error onto its terminal record
    pub fn from_error(err: &Error) -> Self {
        if err.is_rate_limited() {
            return Self::rate_limited();
        }
        Self::error(err.to_string(), err.status_code())
    }

    /// `done` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }

    /// An error record flagged as throttling
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Error {
                status: Some(RATE_LIMITED_STATUS),
                ..
            }
        )
    }
}

/// Serialize a record as one newline-terminated line
pub fn encode_record(record: &ProgressRecord) -> Bytes {
    match serde_json::to_vec(record) {
        Ok(mut line) => {
            line.push(b'\n');
            Bytes::from(line)
        }
        Err(e) => {
            error!("Failed to encode progress record: {e}");
            let fallback = serde_json::json!({ "error": format!("Failed to encode record: {e}") });
            Bytes::from(format!("{fallback}\n"))
        }
    }
}

/// Encode records as they arrive, ending right after the first terminal one.
///
/// Nothing is buffered: each record becomes one chunk as soon as it is polled.
pub fn encode_records<S>(records: S) -> impl Stream<Item = Bytes>
where
    S: Stream<Item = ProgressRecord>,
{
    records
        .scan(false, |ended, record| {
            if *ended {
                return future::ready(None);
            }
            *ended = record.is_terminal();
            future::ready(Some(encode_record(&record)))
        })
}

// ============================================================================
// Wire shape
// ============================================================================

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireRecord {
    Done {
        done: bool,
        #[serde(flatten)]
        snapshot: Snapshot,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
    Progress {
        progress: usize,
    },
}

impl TryFrom<WireRecord> for ProgressRecord {
    type Error = String;

    fn try_from(wire: WireRecord) -> Result<Self, String> {
        match wire {
            WireRecord::Done { done: true, snapshot } => Ok(Self::Done(snapshot)),
            WireRecord::Done { done: false, .. } => Err("done record with done=false".into()),
            WireRecord::Error { error, status } => Ok(Self::Error {
                message: error,
                status,
            }),
            WireRecord::Progress { progress } => Ok(Self::Progress(progress)),
        }
    }
}

impl From<ProgressRecord> for WireRecord {
    fn from(record: ProgressRecord) -> Self {
        match record {
            ProgressRecord::Progress(progress) => Self::Progress { progress },
            ProgressRecord::Error { message, status } => Self::Error {
                error: message,
                status,
            },
            ProgressRecord::Done(snapshot) => Self::Done {
                done: true,
                snapshot,
            },
        }
    }
}
