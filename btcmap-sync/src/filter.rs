//! Liveness predicates (`filter_deleted`) for synchronized collections.

use btcmap_types::{Area, SyncableEntity};
use std::sync::Arc;

/// Returns true for records that belong in the published collection.
pub type EntityFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Keeps every record that is not a tombstone.
pub fn live_only<T: SyncableEntity>() -> EntityFilter<T> {
    Arc::new(|item: &T| !item.is_tombstone())
}

/// Keeps live areas that have not been moved to the trash type.
pub fn live_areas() -> EntityFilter<Area> {
    Arc::new(|area: &Area| !area.is_tombstone() && !area.is_trash())
}
