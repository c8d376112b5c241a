//! SQLite-backed durable cache.
//!
//! Uses a dedicated SQLite file holding snapshot blobs and sync leases.
//! Statements run on the blocking pool so callers never stall the runtime.

use crate::cache::DurableCache;
use crate::error::{StorageError, StorageResult};
use crate::lease::SyncLease;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent snapshot cache backed by SQLite.
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Opens (or creates) a cache at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened snapshot cache at {}", path.as_ref().display());
        Self::from_connection(conn)
    }

    /// Opens an in-memory cache (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sync_leases (
                name TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lists stored snapshot keys.
    pub async fn keys(&self) -> StorageResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM snapshots ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }

    async fn with_conn<F, R>(&self, f: F) -> StorageResult<R>
    where
        F: FnOnce(&Connection) -> StorageResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[async_trait]
impl DurableCache for SqliteCache {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM snapshots WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO snapshots (key, value, saved_at) VALUES (?1, ?2, ?3)",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl SyncLease for SqliteCache {
    async fn try_acquire(&self, name: &str, holder: &str, ttl: Duration) -> StorageResult<bool> {
        let name = name.to_string();
        let holder = holder.to_string();
        let ttl_ms = i64::try_from(ttl.as_millis())
            .map_err(|_| StorageError::InvalidData(format!("lease ttl too large: {ttl:?}")))?;
        self.with_conn(move |conn| {
            let now = Utc::now().timestamp_millis();
            let changed = conn.execute(
                "INSERT INTO sync_leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE
                 SET holder = excluded.holder, expires_at = excluded.expires_at
                 WHERE sync_leases.expires_at <= ?4 OR sync_leases.holder = excluded.holder",
                params![name, holder, now.saturating_add(ttl_ms), now],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn release(&self, name: &str, holder: &str) -> StorageResult<()> {
        let name = name.to_string();
        let holder = holder.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM sync_leases WHERE name = ?1 AND holder = ?2",
                params![name, holder],
            )?;
            Ok(())
        })
        .await
    }
}
