//! Merging pages of incoming records into an id-keyed working set.
//!
//! Conflicts between two versions of the same id resolve by last write
//! wins on `updated_at`. Records rejected by the collection filter
//! (tombstones, trashed areas) are removed from the set instead.

use btcmap_types::{EntityKey, SyncableEntity, Timestamp};
use std::collections::BTreeMap;

/// Id-keyed working set for one sync run.
#[derive(Debug, Clone)]
pub struct Reconciler<T> {
    entries: BTreeMap<EntityKey, T>,
}

impl<T: SyncableEntity> Default for Reconciler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SyncableEntity> Reconciler<T> {
    /// Creates an empty working set.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Seeds the working set from a snapshot.
    pub fn from_snapshot(snapshot: &[T]) -> Self {
        let mut reconciler = Self::new();
        for item in snapshot {
            reconciler.upsert(item.clone());
        }
        reconciler
    }

    /// Inserts `item`, replacing an existing entry with the same id unless
    /// that entry is strictly newer. Returns true if the set changed.
    pub fn upsert(&mut self, item: T) -> bool {
        let key = item.key();
        match self.entries.get(&key) {
            Some(existing) if existing.updated_at() > item.updated_at() => false,
            _ => {
                self.entries.insert(key, item);
                true
            }
        }
    }

    /// Applies one incoming record: upserts it if `keep` accepts it,
    /// otherwise removes its id from the set.
    pub fn apply(&mut self, item: T, keep: impl Fn(&T) -> bool) {
        if keep(&item) {
            self.upsert(item);
        } else {
            self.entries.remove(&item.key());
        }
    }

    /// Drops every entry `keep` rejects.
    pub fn retain(&mut self, keep: impl Fn(&T) -> bool) {
        self.entries.retain(|_, item| keep(item));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&T> {
        self.entries.get(key)
    }

    /// Consumes the set, returning entries ordered by id.
    pub fn into_vec(self) -> Vec<T> {
        self.entries.into_values().collect()
    }
}

/// Latest `updated_at` across `items`. Scans everything; snapshots are not
/// assumed to be sorted.
pub fn max_updated_at<T: SyncableEntity>(items: &[T]) -> Option<Timestamp> {
    Timestamp::max_of(items.iter().map(SyncableEntity::updated_at))
}

/// Cursor for the page after `page`: the latest `updated_at` it contains,
/// never earlier than `current`.
pub fn page_cursor<T: SyncableEntity>(page: &[T], current: &Timestamp) -> Timestamp {
    match max_updated_at(page) {
        Some(max) if max > *current => max,
        _ => *current,
    }
}
