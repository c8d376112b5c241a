//! The tombstone contract every synchronized record satisfies.

use crate::{EntityKey, Timestamp};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record mirrored from the remote API.
///
/// The API returns records ordered by `updated_at`. Deleted records keep
/// appearing with `deleted_at` set for a retention window, then vanish from
/// all later pages.
pub trait SyncableEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Identifier, unique within the collection.
    fn key(&self) -> EntityKey;

    /// Last modification time. Non-decreasing per id.
    fn updated_at(&self) -> &Timestamp;

    /// Deletion time, present on tombstones.
    fn deleted_at(&self) -> Option<&Timestamp>;

    /// Returns true if this record marks a deletion.
    fn is_tombstone(&self) -> bool {
        self.deleted_at().is_some()
    }
}
