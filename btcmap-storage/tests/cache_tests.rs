use btcmap_storage::{
    DurableCache, MemoryCache, SqliteCache, StorageError, SyncLease, load_snapshot, save_snapshot,
};
use btcmap_types::User;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn users() -> Vec<User> {
    serde_json::from_value(json!([
        {"id": 1, "name": "satoshi", "updated_at": "2024-01-01T00:00:00Z"},
        {"id": 2, "name": "hal", "updated_at": "2024-01-02T00:00:00Z"}
    ]))
    .unwrap()
}

// ── SQLite backend ───────────────────────────────────────────────

#[tokio::test]
async fn sqlite_get_missing_key_returns_none() {
    let cache = SqliteCache::open_in_memory().unwrap();
    assert!(cache.get("users_v3").await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_set_replaces_previous_value() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.set("k", "[1]".to_string()).await.unwrap();
    cache.set("k", "[2]".to_string()).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("[2]"));
}

#[tokio::test]
async fn sqlite_remove_missing_key_is_ok() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.remove("never-written").await.unwrap();
}

#[tokio::test]
async fn sqlite_snapshot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache = SqliteCache::open(&path).unwrap();
        save_snapshot(&cache, "users_v3", &users()).await.unwrap();
    }

    let cache = SqliteCache::open(&path).unwrap();
    let loaded: Vec<User> = load_snapshot(&cache, "users_v3").await.unwrap().unwrap();
    assert_eq!(loaded, users());
    assert_eq!(cache.keys().await.unwrap(), vec!["users_v3".to_string()]);
}

#[tokio::test]
async fn load_snapshot_reports_corrupt_json() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.set("users_v3", "{not json".to_string()).await.unwrap();
    let result = load_snapshot::<User>(&cache, "users_v3").await;
    assert!(matches!(result, Err(StorageError::Serialization(_))));
}

// ── SQLite leases ────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_lease_excludes_other_holders() {
    let cache = SqliteCache::open_in_memory().unwrap();
    let ttl = Duration::from_secs(60);

    assert!(cache.try_acquire("areas", "replica-a", ttl).await.unwrap());
    assert!(!cache.try_acquire("areas", "replica-b", ttl).await.unwrap());
    // Re-entrant for the same holder.
    assert!(cache.try_acquire("areas", "replica-a", ttl).await.unwrap());

    cache.release("areas", "replica-a").await.unwrap();
    assert!(cache.try_acquire("areas", "replica-b", ttl).await.unwrap());
}

#[tokio::test]
async fn sqlite_lease_expires() {
    let cache = SqliteCache::open_in_memory().unwrap();
    assert!(cache.try_acquire("areas", "a", Duration::ZERO).await.unwrap());
    assert!(cache.try_acquire("areas", "b", Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn sqlite_release_by_non_holder_is_ignored() {
    let cache = SqliteCache::open_in_memory().unwrap();
    let ttl = Duration::from_secs(60);
    assert!(cache.try_acquire("users", "a", ttl).await.unwrap());
    cache.release("users", "b").await.unwrap();
    assert!(!cache.try_acquire("users", "b", ttl).await.unwrap());
}

// ── Memory backend ───────────────────────────────────────────────

#[tokio::test]
async fn memory_roundtrip_and_write_count() {
    let cache = MemoryCache::new();
    assert_eq!(cache.backend_name(), "memory");

    save_snapshot(&cache, "users_v3", &users()).await.unwrap();
    assert_eq!(cache.write_count(), 1);
    assert!(cache.get("users_v3").await.unwrap().is_some());

    let loaded: Vec<User> = load_snapshot(&cache, "users_v3").await.unwrap().unwrap();
    assert_eq!(loaded.len(), 2);

    cache.remove("users_v3").await.unwrap();
    assert!(cache.get("users_v3").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn memory_lease_expires_with_time() {
    let cache = MemoryCache::new();
    let ttl = Duration::from_secs(30);

    assert!(cache.try_acquire("events", "a", ttl).await.unwrap());
    assert!(!cache.try_acquire("events", "b", ttl).await.unwrap());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(cache.try_acquire("events", "b", ttl).await.unwrap());
}
