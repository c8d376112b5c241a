//! Output cells read by the rest of the application.
//!
//! Consumers either poll the current value or subscribe to changes. A sync
//! run replaces the whole collection at once, so readers never observe a
//! partially merged state.

use std::sync::Arc;
use tokio::sync::watch;

/// Reactive cell holding the current live records of one collection.
#[derive(Clone)]
pub struct CollectionStore<T> {
    tx: Arc<watch::Sender<Arc<Vec<T>>>>,
}

impl<T> Default for CollectionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CollectionStore<T> {
    /// Creates a cell holding an empty collection.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self { tx: Arc::new(tx) }
    }

    /// Current value.
    pub fn get(&self) -> Arc<Vec<T>> {
        self.tx.borrow().clone()
    }

    /// Number of records currently published.
    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.tx.subscribe()
    }

    /// Replaces the current value and notifies subscribers.
    pub fn publish(&self, items: Arc<Vec<T>>) {
        self.tx.send_replace(items);
    }
}

/// Side-channel cell holding the last human-readable sync error.
#[derive(Clone)]
pub struct ErrorCell {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for ErrorCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Last error message, if any.
    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Overwrites the last error message.
    pub fn set(&self, message: impl Into<String>) {
        self.tx.send_replace(Some(message.into()));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
