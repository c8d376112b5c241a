//! Identifier type shared by all synchronized collections.
//!
//! Most collections use integer ids; a few legacy payloads use strings
//! (e.g. `node:123`). Both forms are accepted as-is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a record within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Int(id) => write!(f, "{id}"),
            EntityKey::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(id: i64) -> Self {
        EntityKey::Int(id)
    }
}

impl From<&str> for EntityKey {
    fn from(id: &str) -> Self {
        EntityKey::Str(id.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(id: String) -> Self {
        EntityKey::Str(id)
    }
}
