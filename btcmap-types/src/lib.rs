//! Core type definitions for the BTC Map sync engine.
//!
//! This crate defines the types every synchronized collection shares:
//! - Entity keys (integer or string ids)
//! - ISO-8601 timestamps used as pagination cursors
//! - The tombstone contract (`SyncableEntity`)
//! - The record types of the five mirrored collections
//!
//! Presentation concerns (map markers, icons, area pages) belong to the
//! consumers of the synchronized collections, not here.

mod entity;
mod ids;
mod records;
mod timestamp;

pub use entity::SyncableEntity;
pub use ids::EntityKey;
pub use records::{Area, AreaReport, MapEvent, Place, User};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
