//! Process-wide snapshot cache for server-side hosts.
//!
//! Rebuilding a large collection per request is expensive, so a server
//! keeps the last result in memory and only refreshes it once it is older
//! than the configured freshness window. Each instance is constructed
//! explicitly and shared by reference; there is no global slot.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

struct Entry<T> {
    items: Arc<Vec<T>>,
    synced_at: Instant,
}

/// In-memory, process-lifetime snapshot of one collection.
pub struct ProcessCache<T> {
    slot: RwLock<Option<Entry<T>>>,
    cache_duration: Duration,
}

impl<T> ProcessCache<T> {
    /// Creates an empty cache whose snapshots stay fresh for `cache_duration`.
    pub fn new(cache_duration: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            cache_duration,
        }
    }

    /// Freshness window.
    pub fn cache_duration(&self) -> Duration {
        self.cache_duration
    }

    /// Current snapshot, if one was ever stored.
    pub fn get(&self) -> Option<Arc<Vec<T>>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|entry| Arc::clone(&entry.items))
    }

    /// Stores `items` and marks them synced now.
    pub fn set(&self, items: Arc<Vec<T>>) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Entry {
            items,
            synced_at: Instant::now(),
        });
    }

    /// When the current snapshot was stored.
    pub fn last_sync_time(&self) -> Option<Instant> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|entry| entry.synced_at)
    }

    /// Returns true if a snapshot exists and is younger than the
    /// freshness window.
    pub fn is_fresh(&self) -> bool {
        self.last_sync_time()
            .is_some_and(|at| at.elapsed() < self.cache_duration)
    }
}
