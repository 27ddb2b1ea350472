//! Common types used throughout bookmark-sync
//!
//! Items, authors and the snapshot they are collected into, plus the
//! insertion-ordered dedup list shared by the walker and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Keyed records
// ============================================================================

/// Anything deduplicated by an opaque string id
pub trait Keyed {
    /// The identity used for deduplication
    fn key(&self) -> &str;
}

/// One synchronized bookmark.
///
/// On the wire an item is the upstream object itself; `id` and `author_id`
/// are lifted out of it on decode and the full object is kept as `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonObject", into = "JsonObject")]
pub struct Item {
    /// Opaque unique id
    pub id: String,
    /// Id of the author, when the source expanded it
    pub author_id: Option<String>,
    /// Every field the source returned, `id` included
    pub payload: JsonObject,
}

impl Item {
    /// Build an item from an id and a payload, inserting the id into the payload
    pub fn new(id: impl Into<String>, mut payload: JsonObject) -> Self {
        let id = id.into();
        payload.insert("id".to_string(), JsonValue::String(id.clone()));
        let author_id = payload
            .get("author_id")
            .and_then(JsonValue::as_str)
            .map(ToString::to_string);
        Self {
            id,
            author_id,
            payload,
        }
    }

    /// The text body, if the source sent one
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(JsonValue::as_str)
    }
}

impl TryFrom<JsonObject> for Item {
    type Error = String;

    fn try_from(payload: JsonObject) -> Result<Self, Self::Error> {
        let id = id_of(&payload).ok_or("item is missing an id")?;
        Ok(Self::new(id, payload))
    }
}

impl From<Item> for JsonObject {
    fn from(item: Item) -> Self {
        item.payload
    }
}

impl Keyed for Item {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Author metadata, keyed by the id items refer to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonObject", into = "JsonObject")]
pub struct Author {
    /// Opaque author id
    pub id: String,
    /// Every field the source returned
    pub payload: JsonObject,
}

impl Author {
    /// Build an author from an id and a payload
    pub fn new(id: impl Into<String>, mut payload: JsonObject) -> Self {
        let id = id.into();
        payload.insert("id".to_string(), JsonValue::String(id.clone()));
        Self { id, payload }
    }

    /// Handle shown to users (`username` upstream)
    pub fn username(&self) -> Option<&str> {
        self.payload.get("username").and_then(JsonValue::as_str)
    }
}

impl TryFrom<JsonObject> for Author {
    type Error = String;

    fn try_from(payload: JsonObject) -> Result<Self, Self::Error> {
        let id = id_of(&payload).ok_or("author is missing an id")?;
        Ok(Self::new(id, payload))
    }
}

impl From<Author> for JsonObject {
    fn from(author: Author) -> Self {
        author.payload
    }
}

impl Keyed for Author {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Ids arrive as strings, but tolerate numbers too
fn id_of(payload: &JsonObject) -> Option<String> {
    match payload.get("id")? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Dedup list
// ============================================================================

/// Insertion-ordered list that keeps the first occurrence of each key
#[derive(Debug, Clone)]
pub struct DedupList<T> {
    seen: HashSet<String>,
    entries: Vec<T>,
}

impl<T: Keyed> DedupList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    /// Append `value` unless its key is already present; returns whether it was added
    pub fn insert(&mut self, value: T) -> bool {
        if self.seen.contains(value.key()) {
            return false;
        }
        self.seen.insert(value.key().to_string());
        self.entries.push(value);
        true
    }

    /// Insert every value, returning how many were new
    pub fn extend(&mut self, values: impl IntoIterator<Item = T>) -> usize {
        let mut added = 0;
        for value in values {
            if self.insert(value) {
                added += 1;
            }
        }
        added
    }

    /// Whether a key has been seen
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been inserted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order
    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Consume into entries in first-seen order
    pub fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

impl<T: Keyed> Default for DedupList<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Expansions that travel next to the items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Includes {
    /// Deduplicated authors of the snapshot's items
    #[serde(default)]
    pub users: Vec<Author>,
}

/// The durable result of one successful walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the walk finished
    #[serde(rename = "lastSynced")]
    pub synchronized_at: DateTime<Utc>,
    /// Items in first-seen order
    #[serde(rename = "data")]
    pub items: Vec<Item>,
    /// Author expansions
    #[serde(default)]
    pub includes: Includes,
}

impl Snapshot {
    /// Build a snapshot stamped with the current time
    pub fn new(items: Vec<Item>, authors: Vec<Author>) -> Self {
        Self {
            synchronized_at: Utc::now(),
            items,
            includes: Includes { users: authors },
        }
    }

    /// Deduplicated authors
    pub fn authors(&self) -> &[Author] {
        &self.includes.users
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the snapshot holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item(id: &str, author: &str) -> Item {
        serde_json::from_value(json!({"id": id, "author_id": author, "text": "t"})).unwrap()
    }

    #[test]
    fn test_item_lifts_id_and_author() {
        let item = item("42", "7");
        assert_eq!(item.id, "42");
        assert_eq!(item.author_id.as_deref(), Some("7"));
        assert_eq!(item.text(), Some("t"));
    }

    #[test]
    fn test_item_serializes_as_payload() {
        let value = serde_json::to_value(item("1", "2")).unwrap();
        assert_eq!(value, json!({"id": "1", "author_id": "2", "text": "t"}));
    }

    #[test]
    fn test_item_without_id_is_rejected() {
        let result: std::result::Result<Item, _> = serde_json::from_value(json!({"text": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_id_accepted() {
        let author: Author = serde_json::from_value(json!({"id": 99, "username": "a"})).unwrap();
        assert_eq!(author.id, "99");
        assert_eq!(author.username(), Some("a"));
    }

    #[test]
    fn test_dedup_list_first_wins() {
        let mut list = DedupList::new();
        assert!(list.insert(item("1", "a")));
        assert!(list.insert(item("2", "a")));

        let mut dup = item("1", "b");
        dup.payload.insert("text".into(), json!("later"));
        assert!(!list.insert(dup));

        assert_eq!(list.len(), 2);
        assert!(list.contains("1"));
        assert_eq!(list.as_slice()[0].author_id.as_deref(), Some("a"));
        let ids: Vec<_> = list.into_vec().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_dedup_list_extend_counts_new() {
        let mut list = DedupList::new();
        list.insert(item("1", "a"));
        let added = list.extend(vec![item("1", "a"), item("3", "a"), item("3", "a")]);
        assert_eq!(added, 1);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot = Snapshot::new(vec![item("1", "9")], vec![]);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value["lastSynced"].is_string());
        assert_eq!(value["data"][0]["id"], "1");
        assert_eq!(value["includes"]["users"], json!([]));

        let back: Snapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }
}
