//! In-memory cache backend.
//!
//! Holds snapshots for the lifetime of the process. Used by tests and by
//! hosts that have no writable disk.

use crate::cache::DurableCache;
use crate::error::StorageResult;
use crate::lease::SyncLease;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Process-local snapshot cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
    leases: RwLock<HashMap<String, (String, Instant)>>,
    writes: AtomicUsize,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableCache for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl SyncLease for MemoryCache {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> StorageResult<bool> {
        let mut leases = self.leases.write().await;
        let now = Instant::now();
        if let Some((current, expires_at)) = leases.get(name) {
            if current != holder && *expires_at > now {
                return Ok(false);
            }
        }
        leases.insert(name.to_string(), (holder.to_string(), now + ttl));
        Ok(true)
    }

    async fn release(&self, name: &str, holder: &str) -> StorageResult<()> {
        let mut leases = self.leases.write().await;
        if leases.get(name).is_some_and(|(current, _)| current == holder) {
            leases.remove(name);
        }
        Ok(())
    }
}
