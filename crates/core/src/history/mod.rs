//! Bounded store for previously generated patterns. Injected as a
//! collaborator by the embedding application; the core only defines the
//! container and its eviction policy.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::grid::NestedFrames;
use crate::GridSize;

/// Default number of retained entries.
pub const DEFAULT_LIMIT: usize = 50;

/// One remembered generation, stored in interchange form so it can be
/// persisted or re-imported as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub data: NestedFrames,
    pub size: GridSize,
    pub timestamp_ms: u64,
}

/// FIFO history with a configurable size limit.
#[derive(Debug)]
pub struct HistoryStore {
    items: VecDeque<HistoryItem>,
    limit: usize,
    next_id: u64,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_LIMIT)
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: VecDeque::new(),
            limit,
            next_id: 1,
        }
    }

    /// Appends an entry, assigning it a fresh id. Entries beyond the limit
    /// are evicted oldest-first.
    pub fn append(&mut self, mut item: HistoryItem) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        item.id = id;
        self.items.push_back(item);
        self.evict();
        id
    }

    pub fn list(&self) -> impl Iterator<Item = &HistoryItem> {
        self.items.iter()
    }

    pub fn get(&self, id: u64) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Changes the retention limit, evicting oldest entries that no longer
    /// fit.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.evict();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict(&mut self) {
        while self.items.len() > self.limit {
            self.items.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> HistoryItem {
        HistoryItem {
            id: 0,
            name: name.to_string(),
            description: String::new(),
            data: vec![vec![vec![vec![0]]]],
            size: GridSize::new(1, 1, 1).unwrap(),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn appending_assigns_increasing_ids() {
        let mut store = HistoryStore::new();
        let a = store.append(item("first"));
        let b = store.append(item("second"));
        assert!(b > a);
        assert_eq!(store.get(a).unwrap().name, "first");
    }

    #[test]
    fn evicts_oldest_beyond_the_limit() {
        let mut store = HistoryStore::with_limit(3);
        for name in ["a", "b", "c", "d", "e"] {
            store.append(item(name));
        }
        let names: Vec<&str> = store.list().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["c", "d", "e"]);
    }

    #[test]
    fn lowering_the_limit_evicts_immediately() {
        let mut store = HistoryStore::with_limit(10);
        for name in ["a", "b", "c", "d"] {
            store.append(item(name));
        }
        store.set_limit(2);
        let names: Vec<&str> = store.list().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["c", "d"]);
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = HistoryStore::new();
        store.append(item("a"));
        store.clear();
        assert!(store.is_empty());
    }
}
