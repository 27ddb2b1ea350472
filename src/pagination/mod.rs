//! Cursor pagination
//!
//! # Overview
//!
//! The walker drives a [`PageSource`](crate::source::PageSource) one page at
//! a time, feeding each page's cursor into the next request. It merges pages
//! into insertion-ordered, deduplicated item and author lists and reports the
//! running count after every page. Pages are strictly sequential: each
//! request depends on the previous cursor.

mod types;
mod walker;

pub use types::{StopReason, Walk, WalkState};
pub use walker::{CursorWalker, DEFAULT_MAX_ITEMS};
