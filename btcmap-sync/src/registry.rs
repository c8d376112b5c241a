//! Type-erased view over every collection's sync handle.
//!
//! Hosts trigger syncs and report status without knowing record types.
//! Collections share no mutable state, so `sync_all` runs them concurrently.

use crate::engine::{SyncHandle, SyncOutcome};
use btcmap_types::SyncableEntity;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Object-safe sync operation of one collection.
pub trait CollectionSync: Send + Sync {
    fn name(&self) -> &str;

    /// Runs one sync attempt ("sync now").
    fn sync(&self) -> BoxFuture<'_, SyncOutcome>;

    /// Number of live records currently published.
    fn len(&self) -> usize;

    fn last_error(&self) -> Option<String>;

    fn is_syncing(&self) -> bool;
}

impl<T: SyncableEntity> CollectionSync for SyncHandle<T> {
    fn name(&self) -> &str {
        SyncHandle::name(self)
    }

    fn sync(&self) -> BoxFuture<'_, SyncOutcome> {
        SyncHandle::sync(self).boxed()
    }

    fn len(&self) -> usize {
        self.store().len()
    }

    fn last_error(&self) -> Option<String> {
        self.errors().get()
    }

    fn is_syncing(&self) -> bool {
        SyncHandle::is_syncing(self)
    }
}

/// Snapshot of one collection's state for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub name: String,
    pub count: usize,
    pub syncing: bool,
    pub last_error: Option<String>,
}

/// Ordered set of registered collections.
#[derive(Clone, Default)]
pub struct SyncRegistry {
    collections: Vec<Arc<dyn CollectionSync>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection. Registration order is reporting order.
    pub fn register(&mut self, collection: Arc<dyn CollectionSync>) {
        self.collections.push(collection);
    }

    pub fn names(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CollectionSync>> {
        self.collections.iter().find(|c| c.name() == name)
    }

    /// Syncs every collection concurrently.
    pub async fn sync_all(&self) -> Vec<(String, SyncOutcome)> {
        let runs = self.collections.iter().map(|collection| async move {
            let outcome = collection.sync().await;
            (collection.name().to_string(), outcome)
        });
        join_all(runs).await
    }

    pub fn status(&self) -> Vec<CollectionStatus> {
        self.collections
            .iter()
            .map(|c| CollectionStatus {
                name: c.name().to_string(),
                count: c.len(),
                syncing: c.is_syncing(),
                last_error: c.last_error(),
            })
            .collect()
    }
}
