//! Record types of the mirrored collections.
//!
//! Each record carries the fields the map reads directly plus a flattened
//! `extra` map, so a cached snapshot round-trips every field the API sent.

use crate::{EntityKey, SyncableEntity, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! impl_syncable {
    ($ty:ty) => {
        impl SyncableEntity for $ty {
            fn key(&self) -> EntityKey {
                EntityKey::Int(self.id)
            }

            fn updated_at(&self) -> &Timestamp {
                &self.updated_at
            }

            fn deleted_at(&self) -> Option<&Timestamp> {
                self.deleted_at.as_ref()
            }
        }
    };
}

/// A merchant location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boosted_until: Option<String>,
    pub updated_at: Timestamp,
    #[serde(
        default,
        with = "crate::timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_syncable!(Place);

/// A geographic area (community, country).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    #[serde(default)]
    pub tags: Map<String, Value>,
    pub updated_at: Timestamp,
    #[serde(
        default,
        with = "crate::timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_syncable!(Area);

impl Area {
    /// Areas soft-deleted by moving them to the `trash` type.
    #[must_use]
    pub fn is_trash(&self) -> bool {
        self.tags.get("type").and_then(Value::as_str) == Some("trash")
    }

    /// Convenience accessor for a string tag.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).and_then(Value::as_str)
    }
}

/// A map contributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub updated_at: Timestamp,
    #[serde(
        default,
        with = "crate::timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_syncable!(User);

/// An edit event (place created, updated or deleted by a contributor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEvent {
    pub id: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub updated_at: Timestamp,
    #[serde(
        default,
        with = "crate::timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_syncable!(MapEvent);

/// A daily statistics report for one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaReport {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Map<String, Value>,
    pub updated_at: Timestamp,
    #[serde(
        default,
        with = "crate::timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_syncable!(AreaReport);
