//! Expiring sync leases.
//!
//! The in-process single-flight guard cannot see other processes. When
//! several replicas share one cache file, a lease taken through the cache
//! itself keeps them from running the same collection sync concurrently.
//! A lease that is never released expires after its TTL.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::time::Duration;

/// Compare-and-swap marker with a lease timeout.
#[async_trait]
pub trait SyncLease: Send + Sync {
    /// Takes the lease `name` for `holder` if it is free, expired, or
    /// already held by `holder`. Returns false if another holder owns it.
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> StorageResult<bool>;

    /// Releases the lease if `holder` owns it.
    async fn release(&self, name: &str, holder: &str) -> StorageResult<()>;
}
