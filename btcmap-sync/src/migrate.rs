//! Removal of cache keys left behind by earlier schema versions.

use btcmap_storage::DurableCache;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawns a detached task deleting `keys` from `cache`.
///
/// Failures are logged and ignored. The caller may drop the handle; it is
/// returned so tests can wait for completion.
pub fn purge_legacy_keys(
    cache: Arc<dyn DurableCache>,
    keys: Vec<String>,
) -> Option<JoinHandle<()>> {
    if keys.is_empty() {
        return None;
    }

    Some(tokio::spawn(async move {
        for key in keys {
            match cache.remove(&key).await {
                Ok(()) => debug!("Removed legacy cache key {}", key),
                Err(e) => warn!("Failed to remove legacy cache key {}: {}", key, e),
            }
        }
    }))
}
