//! The five collections mirrored by the map.

use crate::bootstrap::SnapshotBootstrap;
use crate::engine::{OverlapPolicy, SyncConfig, SyncEnv, SyncHandle, create_sync};
use crate::error::SyncResult;
use crate::filter::live_areas;
use crate::process_cache::ProcessCache;
use crate::registry::SyncRegistry;
use btcmap_types::{Area, AreaReport, MapEvent, Place, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Fields the map needs from a place; everything else is fetched on demand.
const PLACE_FIELDS: &str = "id,lat,lon,icon,name,comments,boosted_until,updated_at,deleted_at";

/// Tunables shared by the collection definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Pre-built places snapshot used for the places cold start.
    pub places_snapshot_url: String,
    /// Page size requested from the API.
    pub page_size: usize,
    /// Freshness window of the server-side areas cache, in seconds.
    pub areas_cache_secs: u64,
    /// Upper bound on the network part of a single sync, in seconds.
    pub deadline_secs: u64,
    /// Await an in-flight run instead of skipping.
    pub join_in_flight: bool,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            places_snapshot_url: "https://static.btcmap.org/api/v4/places.json".to_string(),
            page_size: 5_000,
            areas_cache_secs: 600,
            deadline_secs: 300,
            join_in_flight: false,
        }
    }
}

impl CollectionsConfig {
    fn overlap(&self) -> OverlapPolicy {
        if self.join_in_flight {
            OverlapPolicy::Join
        } else {
            OverlapPolicy::Drop
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Sync handles of every collection.
#[derive(Clone)]
pub struct Collections {
    pub places: SyncHandle<Place>,
    pub areas: SyncHandle<Area>,
    pub users: SyncHandle<User>,
    pub events: SyncHandle<MapEvent>,
    pub reports: SyncHandle<AreaReport>,
    /// Server-side areas snapshot, shared across requests.
    pub areas_cache: Arc<ProcessCache<Area>>,
}

impl Collections {
    pub fn new(env: SyncEnv, config: &CollectionsConfig) -> SyncResult<Self> {
        let places = SyncConfig::new("places", "places_v4", "v4/places", config.page_size)
            .with_query("fields", PLACE_FIELDS)
            .with_legacy_keys(["elements", "elements_v2", "elements_v3", "places"])
            .with_bootstrap(Arc::new(SnapshotBootstrap::new(
                config.places_snapshot_url.clone(),
            )));

        let areas_cache = Arc::new(ProcessCache::new(Duration::from_secs(
            config.areas_cache_secs,
        )));
        let areas = SyncConfig::new("areas", "areas_v3", "v3/areas", config.page_size)
            .with_filter(live_areas())
            .with_legacy_keys(["areas", "areas_v2"])
            .with_process_cache(Arc::clone(&areas_cache));

        let users = SyncConfig::new("users", "users_v3", "v3/users", config.page_size)
            .with_legacy_keys(["users", "users_v2"]);

        let events = SyncConfig::new("events", "events_v3", "v3/events", config.page_size)
            .with_legacy_keys(["events", "events_v2"]);

        let reports = SyncConfig::new("reports", "reports_v3", "v3/reports", config.page_size)
            .with_legacy_keys(["reports", "reports_v2"]);

        Ok(Self {
            places: create_sync(finish(places, config), env.clone())?,
            areas: create_sync(finish(areas, config), env.clone())?,
            users: create_sync(finish(users, config), env.clone())?,
            events: create_sync(finish(events, config), env.clone())?,
            reports: create_sync(finish(reports, config), env)?,
            areas_cache,
        })
    }

    /// Registry over all five collections, in display order.
    pub fn registry(&self) -> SyncRegistry {
        let mut registry = SyncRegistry::new();
        registry.register(Arc::new(self.places.clone()));
        registry.register(Arc::new(self.areas.clone()));
        registry.register(Arc::new(self.users.clone()));
        registry.register(Arc::new(self.events.clone()));
        registry.register(Arc::new(self.reports.clone()));
        registry
    }
}

fn finish<T: btcmap_types::SyncableEntity>(
    config: SyncConfig<T>,
    shared: &CollectionsConfig,
) -> SyncConfig<T> {
    config
        .with_overlap(shared.overlap())
        .with_deadline(shared.deadline())
}
