// src/core/database.rs

//! The local document-store surface the coordinator applies tasks against.
//!
//! The real store lives below this crate; `InMemoryDatabase` is a reference
//! implementation sufficient for tests and the standalone demo binary.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// The narrow surface the executor needs from the underlying document store.
pub trait LocalDatabase: Send + Sync {
    /// Executes an already-deserialized record mutation keyed by `key`,
    /// returning the previous value if any. Stands in for the real engine's
    /// `execute(request)` call in the data model.
    fn put(&self, key: &str, value: serde_json::Value) -> Option<serde_json::Value>;

    fn get(&self, key: &str) -> Option<serde_json::Value>;

    fn close(&self);

    /// Clears the level-1/object cache. Invoked by the inbound executor after
    /// every `Task::execute`, regardless of outcome.
    fn clear_level1_cache(&self);
}

/// In-memory reference `LocalDatabase`, backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    records: DashMap<String, serde_json::Value>,
    cache_clears: AtomicU64,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `clear_level1_cache` has run; exposed for tests.
    pub fn cache_clear_count(&self) -> u64 {
        self.cache_clears.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LocalDatabase for InMemoryDatabase {
    fn put(&self, key: &str, value: serde_json::Value) -> Option<serde_json::Value> {
        self.records.insert(key.to_string(), value)
    }

    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    fn close(&self) {
        self.records.clear();
    }

    fn clear_level1_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::Relaxed);
    }
}
