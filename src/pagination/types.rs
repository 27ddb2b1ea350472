//! Walk state and results

use crate::source::Page;
use crate::types::{Author, DedupList, Item, Snapshot};

/// Why a walk ended successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No further cursor, or an empty page
    Exhausted,
    /// The item cap was reached
    CapReached,
}

/// Tracks pagination state during a walk
#[derive(Debug, Clone, Default)]
pub struct WalkState {
    /// Distinct items, first occurrence wins
    pub items: DedupList<Item>,
    /// Distinct authors, first occurrence wins
    pub authors: DedupList<Author>,
    /// Cursor for the next request
    pub cursor: Option<String>,
    /// Pages merged so far
    pub pages: u32,
}

impl WalkState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page and take its cursor; returns whether the source is exhausted
    pub fn merge(&mut self, page: Page) -> bool {
        let last = page.is_last();
        self.items.extend(page.items);
        self.authors.extend(page.authors);
        self.cursor = page.next_cursor;
        self.pages += 1;
        last
    }

    /// Distinct items collected so far
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Freeze into a snapshot stamped now
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot::new(self.items.into_vec(), self.authors.into_vec())
    }
}

/// A completed walk
#[derive(Debug, Clone)]
pub struct Walk {
    /// The collected snapshot
    pub snapshot: Snapshot,
    /// Pages fetched
    pub pages: u32,
    /// Why the walk stopped
    pub stop: StopReason,
}
