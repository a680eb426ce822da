//! Per-session result caches keyed by [`PaperId`].
//!
//! Each cache is a [`DashMap`] holding at most one entry per paper identity.
//! Entries live for the whole session: there is no TTL and no eviction.
//! Only successful results are inserted, so a failed request never disturbs
//! what is already cached.

use std::fmt;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::identity::PaperId;

pub struct ResultCache<V> {
    entries: DashMap<PaperId, Arc<V>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<V> ResultCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PaperId) -> Option<Arc<V>> {
        self.entries.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, id: &PaperId) -> bool {
        self.entries.contains_key(id)
    }

    /// Store a result, replacing any previous entry for the same paper.
    pub fn insert(&self, id: PaperId, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(id, Arc::clone(&value));
        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Set of papers with a request outstanding.
#[derive(Debug, Default)]
pub struct PendingSet {
    ids: DashSet<PaperId>,
}

impl PendingSet {
    /// Mark `id` pending. Returns `false` if it already was.
    pub fn mark(&self, id: PaperId) -> bool {
        self.ids.insert(id)
    }

    /// Mark `id` pending until the returned guard drops. `None` if a request
    /// for it is already outstanding.
    pub fn begin(&self, id: PaperId) -> Option<PendingGuard<'_>> {
        if self.ids.insert(id.clone()) {
            Some(PendingGuard { set: self, id })
        } else {
            None
        }
    }

    pub fn clear(&self, id: &PaperId) {
        self.ids.remove(id);
    }

    pub fn contains(&self, id: &PaperId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[must_use = "the pending mark is removed when the guard drops"]
pub struct PendingGuard<'a> {
    set: &'a PendingSet,
    id: PaperId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.set.clear(&self.id);
    }
}
