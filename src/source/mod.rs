//! Upstream page source
//!
//! # Overview
//!
//! A source answers one request for one page: given a credential and an
//! optional continuation cursor it performs a single read and classifies the
//! answer as a page, a throttling signal, or a failure. It never retries and
//! holds no state between calls; the walker owns the loop.

mod bookmarks;
mod types;

pub use bookmarks::BookmarksSource;
pub use types::{Page, PageOutcome, PageSource, RawPage};
