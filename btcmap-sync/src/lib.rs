//! Entity sync engine for BTC Map collections.
//!
//! Mirrors independently versioned collections (places, areas, users,
//! events, area reports) from the remote paginated API into a durable local
//! cache and publishes them through reactive cells.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Client**: fetches pages of records changed since a cursor, with retries
//! - **Reconciler**: merges pages into an id-keyed set (last write wins,
//!   tombstones remove)
//! - **Bootstrap**: pluggable cold start (paginated, or static snapshot + delta)
//! - **Engine**: the per-collection sync operation with a single-flight guard
//! - **Process cache**: optional server-side snapshot with a freshness window
//! - **Store**: the output cells the application reads
//!
//! ## Sync Process
//!
//! 1. **Guard**: drop (or join) calls that overlap a running sync
//! 2. **Snapshot**: read the process cache (server) or durable cache (client)
//! 3. **Fetch**: cold start without a snapshot, incremental delta otherwise
//! 4. **Persist**: replace the cached snapshot wholesale (best effort)
//! 5. **Publish**: push the live records to the collection's store
//!
//! # Example
//!
//! ```no_run
//! use btcmap_storage::MemoryCache;
//! use btcmap_sync::{
//!     ApiClient, ApiClientConfig, ExecutionContext, SyncConfig, SyncEnv, create_sync,
//! };
//! use btcmap_types::User;
//! use std::sync::Arc;
//!
//! # async fn demo() -> btcmap_sync::SyncResult<()> {
//! let env = SyncEnv {
//!     api: Arc::new(ApiClient::new(ApiClientConfig::default())?),
//!     cache: Arc::new(MemoryCache::new()),
//!     lease: None,
//!     context: ExecutionContext::Client,
//! };
//! let users = create_sync(SyncConfig::<User>::new("users", "users_v3", "v3/users", 5000), env)?;
//! let outcome = users.sync().await;
//! println!("{outcome:?}: {} users", users.store().len());
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod client;
pub mod collections;
mod engine;
mod error;
pub mod filter;
pub mod migrate;
pub mod paginate;
pub mod process_cache;
pub mod reconcile;
pub mod registry;
pub mod store;

pub use bootstrap::{BootstrapStrategy, ColdStartContext, PaginatedBootstrap, SnapshotBootstrap};
pub use client::{ApiClient, ApiClientConfig, PageQuery};
pub use collections::{Collections, CollectionsConfig};
pub use engine::{
    ExecutionContext, OverlapPolicy, SyncConfig, SyncEnv, SyncHandle, SyncOutcome, create_sync,
};
pub use error::{SyncError, SyncResult};
pub use filter::{EntityFilter, live_areas, live_only};
pub use migrate::purge_legacy_keys;
pub use paginate::{Merge, PageFetcher};
pub use process_cache::ProcessCache;
pub use reconcile::{Reconciler, max_updated_at, page_cursor};
pub use registry::{CollectionStatus, CollectionSync, SyncRegistry};
pub use store::{CollectionStore, ErrorCell};
