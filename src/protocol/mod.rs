//! Progress protocol
//!
//! Newline-delimited JSON (`application/x-ndjson`), one record per line:
//!
//! ```text
//! {"progress": 100}
//! {"progress": 200}
//! {"done": true, "lastSynced": "...", "data": [...], "includes": {"users": [...]}}
//! ```
//!
//! or, when the walk fails, a final `{"error": "...", "status": 429}`.
//! Exactly one terminal record (`done` or `error`) ends every stream.

mod decoder;
mod record;

pub use decoder::StreamDecoder;
pub use record::{encode_record, encode_records, ProgressRecord, CONTENT_TYPE, RATE_LIMITED_STATUS};
