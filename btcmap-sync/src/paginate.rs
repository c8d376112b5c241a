//! Pagination loops over the "changed since" endpoint.
//!
//! A page shorter than the requested limit ends the stream. The cursor
//! for the next request is the latest `updated_at` seen in the page.

use crate::client::{ApiClient, PageQuery};
use crate::error::{SyncError, SyncResult};
use crate::reconcile::{Reconciler, page_cursor};
use btcmap_types::{SyncableEntity, Timestamp};
use tracing::debug;

/// Result of an incremental merge.
#[derive(Debug, Clone, PartialEq)]
pub enum Merge<T> {
    /// The first page was empty; the snapshot is current.
    Unchanged,
    /// At least one change was applied.
    Merged(Vec<T>),
}

/// Page source for one collection endpoint.
#[derive(Debug, Clone, Copy)]
pub struct PageFetcher<'a> {
    pub api: &'a ApiClient,
    pub collection: &'a str,
    pub endpoint: &'a str,
    pub page_size: usize,
    pub extra_query: &'a [(String, String)],
}

impl PageFetcher<'_> {
    /// Fetches the page of records updated since `cursor`.
    pub async fn fetch<T: SyncableEntity>(&self, cursor: &Timestamp) -> SyncResult<Vec<T>> {
        let query = PageQuery {
            updated_since: cursor,
            limit: self.page_size,
            extra: self.extra_query,
        };
        self.api.fetch_page(self.endpoint, &query).await
    }

    /// Pages through everything updated since `start`, folding records into
    /// an id-keyed set. An empty first page is an error: a cold start is
    /// never expected to find an empty collection.
    pub async fn fetch_all<T: SyncableEntity>(
        &self,
        start: Timestamp,
    ) -> SyncResult<Reconciler<T>> {
        let mut cursor = start;
        let mut working = Reconciler::new();
        let mut pages = 0usize;
        let mut records = 0usize;

        loop {
            let page: Vec<T> = self.fetch(&cursor).await?;
            if page.is_empty() {
                if pages == 0 {
                    return Err(SyncError::EmptyResult {
                        collection: self.collection.to_string(),
                    });
                }
                break;
            }

            pages += 1;
            records += page.len();
            let full = page.len() >= self.page_size;
            let next = page_cursor(&page, &cursor);
            for item in page {
                working.upsert(item);
            }

            if !full {
                break;
            }
            self.advance(&mut cursor, next)?;
        }

        debug!(
            "{}: fetched {} records in {} pages ({} unique)",
            self.collection,
            records,
            pages,
            working.len()
        );
        Ok(working)
    }

    /// Applies every change since `start` on top of `snapshot`. Records
    /// `keep` rejects are removed. Any failure aborts the whole merge.
    pub async fn merge_since<T, F>(
        &self,
        snapshot: &[T],
        start: Timestamp,
        keep: F,
    ) -> SyncResult<Merge<T>>
    where
        T: SyncableEntity,
        F: Fn(&T) -> bool,
    {
        let mut cursor = start;
        let mut working: Option<Reconciler<T>> = None;
        let mut records = 0usize;

        loop {
            let page: Vec<T> = self.fetch(&cursor).await?;
            if page.is_empty() {
                break;
            }

            records += page.len();
            let full = page.len() >= self.page_size;
            let next = page_cursor(&page, &cursor);
            let set = working.get_or_insert_with(|| Reconciler::from_snapshot(snapshot));
            for item in page {
                set.apply(item, &keep);
            }

            if !full {
                break;
            }
            self.advance(&mut cursor, next)?;
        }

        match working {
            None => {
                debug!("{}: no changes since {}", self.collection, start);
                Ok(Merge::Unchanged)
            }
            Some(set) => {
                debug!(
                    "{}: applied {} changes since {} ({} records)",
                    self.collection,
                    records,
                    start,
                    set.len()
                );
                Ok(Merge::Merged(set.into_vec()))
            }
        }
    }

    fn advance(&self, cursor: &mut Timestamp, next: Timestamp) -> SyncResult<()> {
        if next <= *cursor {
            return Err(SyncError::CursorStalled {
                collection: self.collection.to_string(),
                cursor: cursor.to_iso(),
            });
        }
        *cursor = next;
        Ok(())
    }
}
