//! Tests for the sync engine

use super::*;
use crate::error::Result;
use crate::source::{Page, PageOutcome, PageSource};
use crate::store::MemorySnapshotStore;
use crate::types::{Item, Snapshot};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

struct ScriptedSource(Mutex<VecDeque<PageOutcome>>);

impl ScriptedSource {
    fn new(outcomes: Vec<PageOutcome>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(outcomes.into())))
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, _credential: &Credential, _cursor: Option<&str>) -> PageOutcome {
        self.0.lock().unwrap().pop_front().expect("unscripted page")
    }
}

struct BrokenStore;

#[async_trait]
impl SnapshotStore for BrokenStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(None)
    }

    async fn replace(&self, _snapshot: &Snapshot) -> Result<()> {
        Err(Error::storage("disk full"))
    }
}

fn page(ids: &[&str], next: Option<&str>) -> PageOutcome {
    PageOutcome::Page(Page {
        items: ids
            .iter()
            .map(|id| serde_json::from_value::<Item>(json!({"id": id})).unwrap())
            .collect(),
        authors: vec![],
        next_cursor: next.map(ToString::to_string),
    })
}

fn engine(outcomes: Vec<PageOutcome>, store: Arc<dyn SnapshotStore>) -> SyncEngine {
    SyncEngine::new(CursorWalker::new(ScriptedSource::new(outcomes)), store)
}

fn credential() -> Credential {
    Credential::new("tok", "1")
}

#[tokio::test]
async fn test_success_stores_then_emits_done() {
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = engine(
        vec![page(&["1", "2"], Some("c")), page(&["3"], None)],
        store.clone(),
    );

    let records: Vec<_> = engine.start(credential()).collect().await;

    assert_eq!(records.len(), 3);
    assert_eq!(records[0], ProgressRecord::Progress(2));
    assert_eq!(records[1], ProgressRecord::Progress(3));
    let ProgressRecord::Done(snapshot) = &records[2] else {
        panic!("Expected done, got {:?}", records[2]);
    };
    assert_eq!(snapshot.len(), 3);
    assert_eq!(store.load().await.unwrap().as_ref(), Some(snapshot));
}

#[tokio::test]
async fn test_rate_limit_leaves_store_untouched() {
    let previous = Snapshot::new(vec![], vec![]);
    let store = Arc::new(MemorySnapshotStore::with_snapshot(previous.clone()));
    let engine = engine(
        vec![page(&["1"], Some("c")), PageOutcome::RateLimited],
        store.clone(),
    );

    let records: Vec<_> = engine.start(credential()).collect().await;

    assert_eq!(
        records,
        vec![ProgressRecord::Progress(1), ProgressRecord::rate_limited()]
    );
    assert_eq!(store.load().await.unwrap(), Some(previous));
}

#[tokio::test]
async fn test_failure_is_terminal_error_record() {
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = engine(
        vec![PageOutcome::failure(Some(500), "Failed to fetch bookmarks")],
        store.clone(),
    );

    let records: Vec<_> = engine.start(credential()).collect().await;

    assert_eq!(
        records,
        vec![ProgressRecord::error("Failed to fetch bookmarks", Some(500))]
    );
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_failure_becomes_error_record() {
    let engine = engine(vec![page(&["1"], None)], Arc::new(BrokenStore));

    let records: Vec<_> = engine.start(credential()).collect().await;

    assert_eq!(records.len(), 2);
    assert!(records[1].is_terminal());
    assert!(matches!(&records[1], ProgressRecord::Error { message, .. } if message.contains("disk full")));
}

#[tokio::test]
async fn test_exactly_one_terminal_record() {
    let outcomes = (0..5)
        .map(|n| page(&[n.to_string().as_str()], Some("more")))
        .chain(std::iter::once(page(&["last"], None)))
        .collect();
    let engine = engine(outcomes, Arc::new(MemorySnapshotStore::new()))
        .with_channel_capacity(1);

    let records: Vec<_> = engine.start(credential()).collect().await;

    assert_eq!(records.iter().filter(|r| r.is_terminal()).count(), 1);
    assert!(records.last().unwrap().is_terminal());
    let counts: Vec<usize> = records
        .iter()
        .filter_map(|r| match r {
            ProgressRecord::Progress(n) => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 2, 3, 4, 5, 6]);
}
