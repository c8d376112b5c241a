//! Cold-start strategies.
//!
//! A collection without a local snapshot needs a first full copy. Small
//! collections page through the API from the sync epoch. Places are too
//! large for that and seed from a pre-built static file instead, then catch
//! up with a single delta against the API.

use crate::error::{SyncError, SyncResult};
use crate::filter::EntityFilter;
use crate::paginate::{Merge, PageFetcher};
use async_trait::async_trait;
use btcmap_types::{SyncableEntity, Timestamp};
use tracing::{info, warn};

/// Inputs available to a cold start.
pub struct ColdStartContext<'a, T> {
    pub fetcher: PageFetcher<'a>,
    pub filter: &'a EntityFilter<T>,
}

/// Produces the first snapshot of a collection.
///
/// The returned records are what gets persisted. Liveness filtering for
/// publication happens in the engine.
#[async_trait]
pub trait BootstrapStrategy<T: SyncableEntity>: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    async fn cold_start(&self, ctx: &ColdStartContext<'_, T>) -> SyncResult<Vec<T>>;
}

/// Pages the whole collection from [`Timestamp::sync_epoch`] and keeps
/// only live records.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginatedBootstrap;

#[async_trait]
impl<T: SyncableEntity> BootstrapStrategy<T> for PaginatedBootstrap {
    fn name(&self) -> &'static str {
        "paginated"
    }

    async fn cold_start(&self, ctx: &ColdStartContext<'_, T>) -> SyncResult<Vec<T>> {
        let mut working = ctx.fetcher.fetch_all(Timestamp::sync_epoch()).await?;
        let filter = ctx.filter;
        working.retain(|item| filter(item));
        Ok(working.into_vec())
    }
}

/// Seeds from a static snapshot file, then applies one delta from the
/// file's `Last-Modified` time.
#[derive(Debug, Clone)]
pub struct SnapshotBootstrap {
    url: String,
    max_age_days: i64,
    fallback_days: i64,
}

impl SnapshotBootstrap {
    /// Older `Last-Modified` values are not trusted as a cursor.
    pub const DEFAULT_MAX_AGE_DAYS: i64 = 90;
    /// Cursor age used when `Last-Modified` is missing or too old.
    pub const DEFAULT_FALLBACK_DAYS: i64 = 14;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_age_days: Self::DEFAULT_MAX_AGE_DAYS,
            fallback_days: Self::DEFAULT_FALLBACK_DAYS,
        }
    }

    pub fn with_window(mut self, max_age_days: i64, fallback_days: i64) -> Self {
        self.max_age_days = max_age_days;
        self.fallback_days = fallback_days;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Cursor for the catch-up delta: `last_modified` when it lies within
    /// the trusted window (and not in the future), otherwise
    /// `fallback_days` before `now`.
    pub fn delta_cursor(&self, last_modified: Option<Timestamp>, now: Timestamp) -> Timestamp {
        match last_modified {
            Some(ts) if ts <= now && ts.is_within_days_of(&now, self.max_age_days) => ts,
            _ => now.days_before(self.fallback_days),
        }
    }
}

#[async_trait]
impl<T: SyncableEntity> BootstrapStrategy<T> for SnapshotBootstrap {
    fn name(&self) -> &'static str {
        "static-snapshot"
    }

    async fn cold_start(&self, ctx: &ColdStartContext<'_, T>) -> SyncResult<Vec<T>> {
        let api = ctx.fetcher.api;

        let last_modified = match api.head_last_modified(&self.url).await {
            Ok(ts) => ts,
            Err(e) => {
                warn!("{}: HEAD {} failed: {}", ctx.fetcher.collection, self.url, e);
                None
            }
        };

        let snapshot: Vec<T> = api.get_json(&self.url).await?;
        if snapshot.is_empty() {
            return Err(SyncError::EmptyResult {
                collection: ctx.fetcher.collection.to_string(),
            });
        }
        let cursor = self.delta_cursor(last_modified, Timestamp::now());
        info!(
            "{}: loaded {} records from static snapshot, catching up since {}",
            ctx.fetcher.collection,
            snapshot.len(),
            cursor
        );

        let filter = ctx.filter;
        match ctx.fetcher.merge_since(&snapshot, cursor, |item| filter(item)).await {
            Ok(Merge::Unchanged) => Ok(snapshot),
            Ok(Merge::Merged(items)) => Ok(items),
            Err(e) => {
                warn!(
                    "{}: delta after static snapshot failed, keeping snapshot: {}",
                    ctx.fetcher.collection, e
                );
                Ok(snapshot)
            }
        }
    }
}
