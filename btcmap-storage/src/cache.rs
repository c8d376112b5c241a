//! Durable cache abstraction.

use crate::error::StorageResult;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Key-value store holding one serialized snapshot per key.
///
/// All operations are asynchronous and fallible. Callers treat failures as
/// best-effort: a failed write must never prevent a sync result from being
/// published.
#[async_trait]
pub trait DurableCache: Send + Sync {
    /// Returns the backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Reads the raw JSON stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replaces the value stored under `key`.
    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Reads and decodes the snapshot array stored under `key`.
pub async fn load_snapshot<T: DeserializeOwned>(
    cache: &dyn DurableCache,
    key: &str,
) -> StorageResult<Option<Vec<T>>> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encodes `items` and stores them under `key`, replacing any previous value.
pub async fn save_snapshot<T: Serialize>(
    cache: &dyn DurableCache,
    key: &str,
    items: &[T],
) -> StorageResult<()> {
    let raw = serde_json::to_string(items)?;
    cache.set(key, raw).await
}
