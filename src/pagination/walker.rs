//! The cursor walker

use super::types::{StopReason, Walk, WalkState};
use crate::auth::Credential;
use crate::error::{Error, Result};
use crate::protocol::{ProgressRecord, RATE_LIMITED_STATUS};
use crate::source::{PageOutcome, PageSource};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default item cap per walk
pub const DEFAULT_MAX_ITEMS: usize = 500;

/// Walks a paginated source from the first page to exhaustion or the cap
#[derive(Clone)]
pub struct CursorWalker {
    source: Arc<dyn PageSource>,
    max_items: usize,
}

impl CursorWalker {
    /// Create a walker with the default cap
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Set the item cap
    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// The item cap
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Walk the source, sending a `progress` record after every page.
    ///
    /// The cap is checked between pages, so the page that crosses it is
    /// kept whole. A throttled or failed page ends the walk with an error
    /// and no further progress. A closed `progress` channel means nobody is
    /// listening any more and ends the walk with [`Error::Cancelled`].
    pub async fn walk(
        &self,
        credential: &Credential,
        progress: &mpsc::Sender<ProgressRecord>,
    ) -> Result<Walk> {
        let start = Instant::now();
        let mut state = WalkState::new();

        let stop = loop {
            if state.count() >= self.max_items {
                break StopReason::CapReached;
            }

            let page = match self
                .source
                .fetch_page(credential, state.cursor.as_deref())
                .await
            {
                PageOutcome::Page(page) => page,
                PageOutcome::RateLimited => {
                    warn!("Walk rate limited after {} pages", state.pages);
                    return Err(Error::RateLimited {
                        status: RATE_LIMITED_STATUS,
                    });
                }
                PageOutcome::Failure { status, message } => {
                    warn!("Walk failed after {} pages: {message}", state.pages);
                    return Err(Error::source_failure(status, message));
                }
            };

            let exhausted = state.merge(page);
            debug!("Page {}: {} items so far", state.pages, state.count());

            progress
                .send(ProgressRecord::Progress(state.count()))
                .await
                .map_err(|_| Error::Cancelled)?;

            if exhausted {
                break StopReason::Exhausted;
            }
        };

        let pages = state.pages;
        let snapshot = state.into_snapshot();
        info!(
            "Walk finished ({stop:?}): {} items, {} authors, {pages} pages in {:?}",
            snapshot.len(),
            snapshot.authors().len(),
            start.elapsed()
        );

        Ok(Walk {
            snapshot,
            pages,
            stop,
        })
    }
}

impl std::fmt::Debug for CursorWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorWalker")
            .field("max_items", &self.max_items)
            .finish_non_exhaustive()
    }
}
