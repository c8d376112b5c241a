//! Sync factory: one synchronization run per call for a given collection.
//!
//! `create_sync` composes the pagination client, the reconciler and the
//! cache tiers into a handle whose `sync()` never fails. Every failure ends
//! up in the collection's error cell and the logs; the reactive store keeps
//! serving the last good data.
//!
//! Run order:
//! 1. single-flight guard (per handle), then the optional cross-process lease
//! 2. server context with a process cache: fresh snapshot → publish; stale →
//!    incremental; empty → cold start
//! 3. otherwise: purge legacy keys, read the durable snapshot, then cold
//!    start or incremental, persist and publish

use crate::bootstrap::{BootstrapStrategy, ColdStartContext, PaginatedBootstrap};
use crate::client::ApiClient;
use crate::error::{SyncError, SyncResult};
use crate::filter::{EntityFilter, live_only};
use crate::migrate::purge_legacy_keys;
use crate::paginate::{Merge, PageFetcher};
use crate::process_cache::ProcessCache;
use crate::reconcile::max_updated_at;
use crate::store::{CollectionStore, ErrorCell};
use btcmap_storage::{DurableCache, SyncLease, load_snapshot, save_snapshot};
use btcmap_types::{SyncableEntity, Timestamp};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where the engine runs. Only servers consult a process cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    #[default]
    Client,
    Server,
}

/// What a call does while another run of the same collection is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Return [`SyncOutcome::Skipped`] immediately.
    #[default]
    Drop,
    /// Wait for the in-flight run and return its outcome.
    Join,
}

/// Result of one sync call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another run was in flight (or another process holds the lease).
    Skipped,
    /// A fresh process-cache snapshot was published without network access.
    CacheHit { count: usize },
    /// The remote API reported no changes; the snapshot was republished.
    Unchanged { count: usize },
    /// New data was fetched and published.
    Updated { count: usize },
    /// Refresh failed; the previous snapshot was republished.
    Degraded { count: usize, error: String },
    /// Nothing usable was produced; the store was left untouched.
    Failed { error: String },
}

impl SyncOutcome {
    /// Returns true if the store holds data confirmed by this run.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SyncOutcome::CacheHit { .. }
                | SyncOutcome::Unchanged { .. }
                | SyncOutcome::Updated { .. }
        )
    }

    /// Number of live records published by this run.
    pub fn count(&self) -> Option<usize> {
        match self {
            SyncOutcome::CacheHit { count }
            | SyncOutcome::Unchanged { count }
            | SyncOutcome::Updated { count }
            | SyncOutcome::Degraded { count, .. } => Some(*count),
            SyncOutcome::Skipped | SyncOutcome::Failed { .. } => None,
        }
    }
}

/// Per-collection sync settings, built once.
pub struct SyncConfig<T: SyncableEntity> {
    /// Collection name for logs and error messages.
    pub name: String,
    /// Durable cache key holding the snapshot.
    pub cache_key: String,
    /// Endpoint path (relative to the API base URL) or absolute URL.
    pub endpoint: String,
    /// Requested page size; a shorter page ends pagination.
    pub page_size: usize,
    /// Extra query parameters (field selection, compression).
    pub extra_query: Vec<(String, String)>,
    /// Output cell.
    pub store: CollectionStore<T>,
    /// Last-error cell.
    pub errors: ErrorCell,
    /// Liveness predicate.
    pub filter: EntityFilter<T>,
    /// Cache keys of earlier schema versions, purged before each client sync.
    pub legacy_keys: Vec<String>,
    /// Process-wide snapshot, consulted in server context only.
    pub process_cache: Option<Arc<ProcessCache<T>>>,
    /// How a cold start obtains the first snapshot.
    pub bootstrap: Arc<dyn BootstrapStrategy<T>>,
    pub overlap: OverlapPolicy,
    /// Upper bound on the network part of a run.
    pub deadline: Duration,
    /// Expiry of the cross-process lease when one is configured.
    pub lease_ttl: Duration,
}

impl<T: SyncableEntity> SyncConfig<T> {
    pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);
    pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(600);

    /// Creates a config with live-only filtering, paginated cold start and
    /// drop-on-overlap semantics.
    pub fn new(
        name: impl Into<String>,
        cache_key: impl Into<String>,
        endpoint: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            cache_key: cache_key.into(),
            endpoint: endpoint.into(),
            page_size,
            extra_query: Vec::new(),
            store: CollectionStore::new(),
            errors: ErrorCell::new(),
            filter: live_only(),
            legacy_keys: Vec::new(),
            process_cache: None,
            bootstrap: Arc::new(PaginatedBootstrap),
            overlap: OverlapPolicy::Drop,
            deadline: Self::DEFAULT_DEADLINE,
            lease_ttl: Self::DEFAULT_LEASE_TTL,
        }
    }

    pub fn with_filter(mut self, filter: EntityFilter<T>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_query.push((name.into(), value.into()));
        self
    }

    pub fn with_legacy_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legacy_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_process_cache(mut self, cache: Arc<ProcessCache<T>>) -> Self {
        self.process_cache = Some(cache);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: Arc<dyn BootstrapStrategy<T>>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_store(mut self, store: CollectionStore<T>, errors: ErrorCell) -> Self {
        self.store = store;
        self.errors = errors;
        self
    }

    fn validate(&self) -> SyncResult<()> {
        if self.page_size == 0 {
            return Err(SyncError::Config(format!("{}: page size must be positive", self.name)));
        }
        if self.cache_key.is_empty() {
            return Err(SyncError::Config(format!("{}: cache key is empty", self.name)));
        }
        if self.legacy_keys.contains(&self.cache_key) {
            return Err(SyncError::Config(format!(
                "{}: cache key {} is listed as legacy",
                self.name, self.cache_key
            )));
        }
        Ok(())
    }
}

/// Services shared by every collection.
#[derive(Clone)]
pub struct SyncEnv {
    pub api: Arc<ApiClient>,
    pub cache: Arc<dyn DurableCache>,
    /// Cross-process mutual exclusion; `None` relies on the in-process guard.
    pub lease: Option<Arc<dyn SyncLease>>,
    pub context: ExecutionContext,
}

type SharedRun = Shared<BoxFuture<'static, SyncOutcome>>;

enum Flight {
    /// Holds the running future until the slot lock is released.
    Skip(SharedRun),
    Join(SharedRun),
    Lead(SharedRun),
}

/// The run currently in flight. Only callers awaiting it keep it alive.
struct FlightSlot {
    id: u64,
    run: WeakShared<BoxFuture<'static, SyncOutcome>>,
}

#[derive(Default)]
struct FlightState {
    next_id: u64,
    current: Option<FlightSlot>,
}

impl FlightState {
    fn running(&self) -> Option<SharedRun> {
        self.current.as_ref().and_then(|slot| slot.run.upgrade())
    }
}

struct Inner<T: SyncableEntity> {
    config: SyncConfig<T>,
    env: SyncEnv,
    holder: String,
    in_flight: Mutex<FlightState>,
}

/// Lives inside the shared run and clears its slot when the run completes
/// or when the last awaiting caller drops it.
struct FlightGuard<T: SyncableEntity> {
    inner: Arc<Inner<T>>,
    id: u64,
}

impl<T: SyncableEntity> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        let mut state = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if state.current.as_ref().is_some_and(|slot| slot.id == self.id) {
            state.current = None;
        }
    }
}

/// Releases a held lease. Dropped without [`LeaseGuard::release`] (the run
/// was cancelled), it hands the release to a background task.
struct LeaseGuard {
    lease: Option<Arc<dyn SyncLease>>,
    key: String,
    holder: String,
    name: String,
}

impl LeaseGuard {
    async fn release(mut self) {
        if let Some(lease) = self.lease.take() {
            if let Err(e) = lease.release(&self.key, &self.holder).await {
                warn!("{}: failed to release lease: {}", self.name, e);
            }
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("{}: no runtime to release lease; it will expire", self.name);
            return;
        };
        let key = std::mem::take(&mut self.key);
        let holder = std::mem::take(&mut self.holder);
        let name = std::mem::take(&mut self.name);
        debug!("{}: sync cancelled, releasing lease", name);
        runtime.spawn(async move {
            if let Err(e) = lease.release(&key, &holder).await {
                warn!("{}: failed to release lease: {}", name, e);
            }
        });
    }
}

/// Handle to one collection's sync operation.
pub struct SyncHandle<T: SyncableEntity> {
    inner: Arc<Inner<T>>,
}

impl<T: SyncableEntity> Clone for SyncHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builds the sync operation for one collection.
pub fn create_sync<T: SyncableEntity>(
    config: SyncConfig<T>,
    env: SyncEnv,
) -> SyncResult<SyncHandle<T>> {
    config.validate()?;
    Ok(SyncHandle {
        inner: Arc::new(Inner {
            config,
            env,
            holder: uuid::Uuid::new_v4().to_string(),
            in_flight: Mutex::new(FlightState::default()),
        }),
    })
}

impl<T: SyncableEntity> SyncHandle<T> {
    /// Runs one synchronization attempt. Never fails; see [`SyncOutcome`].
    pub async fn sync(&self) -> SyncOutcome {
        let flight = {
            let mut state = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match (state.running(), self.inner.config.overlap) {
                (Some(running), OverlapPolicy::Drop) => Flight::Skip(running),
                (Some(running), OverlapPolicy::Join) => Flight::Join(running),
                (None, _) => {
                    let id = state.next_id;
                    state.next_id = state.next_id.wrapping_add(1);
                    let guard = FlightGuard {
                        inner: Arc::clone(&self.inner),
                        id,
                    };
                    let run = async move { guard.inner.run().await }
                        .boxed()
                        .shared();
                    state.current = run.downgrade().map(|run| FlightSlot { id, run });
                    Flight::Lead(run)
                }
            }
        };

        match flight {
            Flight::Skip(_running) => {
                info!("{}: sync already in progress, skipping", self.inner.config.name);
                SyncOutcome::Skipped
            }
            Flight::Join(run) => {
                debug!("{}: joining in-flight sync", self.inner.config.name);
                run.await
            }
            Flight::Lead(run) => run.await,
        }
    }

    /// Returns true while a run is in flight.
    pub fn is_syncing(&self) -> bool {
        // The upgraded run must outlive the lock: dropping the last strong
        // reference runs FlightGuard, which takes the same lock.
        let running = {
            let state = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            state.running()
        };
        running.is_some()
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &SyncConfig<T> {
        &self.inner.config
    }

    /// Output cell of this collection.
    pub fn store(&self) -> &CollectionStore<T> {
        &self.inner.config.store
    }

    /// Last-error cell of this collection.
    pub fn errors(&self) -> &ErrorCell {
        &self.inner.config.errors
    }
}

impl<T: SyncableEntity> Inner<T> {
    async fn run(&self) -> SyncOutcome {
        let name = &self.config.name;

        let leased = match &self.env.lease {
            Some(lease) => {
                match lease
                    .try_acquire(&self.config.cache_key, &self.holder, self.config.lease_ttl)
                    .await
                {
                    Ok(true) => Some(LeaseGuard {
                        lease: Some(Arc::clone(lease)),
                        key: self.config.cache_key.clone(),
                        holder: self.holder.clone(),
                        name: name.clone(),
                    }),
                    Ok(false) => {
                        info!("{}: another process is syncing, skipping", name);
                        return SyncOutcome::Skipped;
                    }
                    Err(e) => {
                        warn!("{}: lease unavailable, continuing without it: {}", name, e);
                        None
                    }
                }
            }
            None => None,
        };

        let outcome = match (&self.config.process_cache, self.env.context) {
            (Some(process_cache), ExecutionContext::Server) => {
                self.sync_process_cache(process_cache).await
            }
            _ => self.sync_durable().await,
        };

        if let Some(lease) = leased {
            lease.release().await;
        }

        info!("{}: sync finished: {:?}", name, outcome);
        outcome
    }

    async fn sync_process_cache(&self, process_cache: &ProcessCache<T>) -> SyncOutcome {
        let Some(snapshot) = process_cache.get() else {
            return match self.cold_start().await {
                Ok(items) => {
                    let items = Arc::new(items);
                    process_cache.set(Arc::clone(&items));
                    SyncOutcome::Updated {
                        count: self.publish(&items),
                    }
                }
                Err(e) => self.fail(&e),
            };
        };

        if process_cache.is_fresh() {
            debug!("{}: process cache is fresh", self.config.name);
            return SyncOutcome::CacheHit {
                count: self.publish(&snapshot),
            };
        }

        match self.incremental(&snapshot).await {
            Ok(Merge::Unchanged) => {
                process_cache.set(Arc::clone(&snapshot));
                SyncOutcome::Unchanged {
                    count: self.publish(&snapshot),
                }
            }
            Ok(Merge::Merged(items)) => {
                let items = Arc::new(items);
                process_cache.set(Arc::clone(&items));
                SyncOutcome::Updated {
                    count: self.publish(&items),
                }
            }
            Err(e) => self.degrade(&e, &snapshot),
        }
    }

    async fn sync_durable(&self) -> SyncOutcome {
        let name = &self.config.name;
        let cache = self.env.cache.as_ref();

        purge_legacy_keys(Arc::clone(&self.env.cache), self.config.legacy_keys.clone());

        let snapshot = match load_snapshot::<T>(cache, &self.config.cache_key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("{}: failed to read cached snapshot, starting cold: {}", name, e);
                None
            }
        };

        let Some(snapshot) = snapshot else {
            info!(
                "{}: no cached snapshot, cold start ({})",
                name,
                self.config.bootstrap.name()
            );
            return match self.cold_start().await {
                Ok(items) => {
                    self.persist(&items).await;
                    SyncOutcome::Updated {
                        count: self.publish(&Arc::new(items)),
                    }
                }
                Err(e) => self.fail(&e),
            };
        };

        let snapshot = Arc::new(snapshot);
        match self.incremental(&snapshot).await {
            Ok(Merge::Unchanged) => SyncOutcome::Unchanged {
                count: self.publish(&snapshot),
            },
            Ok(Merge::Merged(items)) => {
                self.persist(&items).await;
                SyncOutcome::Updated {
                    count: self.publish(&Arc::new(items)),
                }
            }
            Err(e) => self.degrade(&e, &snapshot),
        }
    }

    fn fetcher(&self) -> PageFetcher<'_> {
        PageFetcher {
            api: &self.env.api,
            collection: &self.config.name,
            endpoint: &self.config.endpoint,
            page_size: self.config.page_size,
            extra_query: &self.config.extra_query,
        }
    }

    async fn cold_start(&self) -> SyncResult<Vec<T>> {
        let ctx = ColdStartContext {
            fetcher: self.fetcher(),
            filter: &self.config.filter,
        };
        self.bounded(self.config.bootstrap.cold_start(&ctx)).await
    }

    async fn incremental(&self, snapshot: &[T]) -> SyncResult<Merge<T>> {
        let cursor = max_updated_at(snapshot).unwrap_or_else(Timestamp::sync_epoch);
        let filter = &self.config.filter;
        self.bounded(self.fetcher().merge_since(snapshot, cursor, |item| filter(item)))
            .await
    }

    async fn bounded<R>(&self, fut: impl Future<Output = SyncResult<R>>) -> SyncResult<R> {
        tokio::time::timeout(self.config.deadline, fut)
            .await
            .unwrap_or(Err(SyncError::Timeout))
    }

    /// Best-effort write of a non-empty result.
    async fn persist(&self, items: &[T]) {
        if items.is_empty() {
            return;
        }
        let cache = self.env.cache.as_ref();
        match save_snapshot(cache, &self.config.cache_key, items).await {
            Ok(()) => debug!(
                "{}: persisted {} records to {} cache",
                self.config.name,
                items.len(),
                cache.backend_name()
            ),
            Err(e) => warn!("{}: failed to persist snapshot: {}", self.config.name, e),
        }
    }

    /// Publishes the live records of `items`. Reuses the allocation when
    /// every record is live.
    fn publish(&self, items: &Arc<Vec<T>>) -> usize {
        let filter = &self.config.filter;
        let live = if items.iter().all(|item| filter(item)) {
            Arc::clone(items)
        } else {
            Arc::new(items.iter().filter(|item| filter(item)).cloned().collect())
        };
        let count = live.len();
        self.config.store.publish(live);
        count
    }

    fn message(&self, err: &SyncError) -> String {
        format!("Failed to sync {}: {}", self.config.name, err)
    }

    fn fail(&self, err: &SyncError) -> SyncOutcome {
        let message = self.message(err);
        error!("{}", message);
        self.config.errors.set(message.clone());
        SyncOutcome::Failed { error: message }
    }

    fn degrade(&self, err: &SyncError, snapshot: &Arc<Vec<T>>) -> SyncOutcome {
        let message = self.message(err);
        warn!("{}; serving cached snapshot", message);
        self.config.errors.set(message.clone());
        SyncOutcome::Degraded {
            count: self.publish(snapshot),
            error: message,
        }
    }
}
