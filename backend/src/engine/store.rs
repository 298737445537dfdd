//! Keyed session stores for progress snapshots and results.
//!
//! The engine writes whole values only (insert/replace/remove), so a
//! concurrent reader always gets a complete snapshot, possibly one batch
//! stale. [`InMemoryStore`] is backed by a [`DashMap`]; other backends can
//! implement [`JobStore`] and be injected into the engine.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Storage for one kind of per-job state.
pub trait JobStore<V>: Send + Sync {
    /// Insert or replace the value for `job_id`.
    fn put(&self, job_id: &str, value: V);

    /// Insert only if no value exists. Returns `false` when occupied.
    fn insert_if_absent(&self, job_id: &str, value: V) -> bool;

    fn get(&self, job_id: &str) -> Option<V>;

    fn remove(&self, job_id: &str) -> Option<V>;

    fn contains(&self, job_id: &str) -> bool {
        self.get(job_id).is_some()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store over a concurrent hash map.
#[derive(Debug)]
pub struct InMemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> JobStore<V> for InMemoryStore<V> {
    fn put(&self, job_id: &str, value: V) {
        self.entries.insert(job_id.to_string(), value);
    }

    fn insert_if_absent(&self, job_id: &str, value: V) -> bool {
        match self.entries.entry(job_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    fn get(&self, job_id: &str) -> Option<V> {
        self.entries.get(job_id).map(|entry| entry.value().clone())
    }

    fn remove(&self, job_id: &str) -> Option<V> {
        self.entries.remove(job_id).map(|(_, value)| value)
    }

    fn contains(&self, job_id: &str) -> bool {
        self.entries.contains_key(job_id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
