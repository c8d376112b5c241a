//! Durable snapshot cache for the BTC Map sync engine.
//!
//! Each synchronized collection persists one JSON array under one key. The
//! array is replaced wholesale on every successful sync, so the cache is a
//! plain key-value store rather than a relational model.
//!
//! # Backends
//!
//! - [`SqliteCache`]: a single SQLite file, survives process restarts
//! - [`MemoryCache`]: process-local map for tests and ephemeral hosts
//!
//! Both backends also implement [`SyncLease`], an expiring marker used to
//! keep several processes sharing one cache from syncing the same
//! collection at once.

mod cache;
mod error;
mod lease;
mod memory;
mod sqlite;

pub use cache::{DurableCache, load_snapshot, save_snapshot};
pub use error::{StorageError, StorageResult};
pub use lease::SyncLease;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
