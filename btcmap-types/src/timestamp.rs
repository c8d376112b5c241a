//! ISO-8601 timestamps used for `updated_at`, `deleted_at` and the
//! `updated_since` pagination cursor.
//!
//! The remote API orders records by `updated_at` and compares cursors as
//! instants, so timestamps are normalised to UTC and rendered without
//! dropping any sub-second digits the server sent.

use crate::Error;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SYNC_EPOCH_SECS: i64 = 1_640_995_200;

/// A UTC instant with ISO-8601 text representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Cursor used by a cold start (`2022-01-01T00:00:00Z`): every
    /// record has been updated after it.
    #[must_use]
    pub fn sync_epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(SYNC_EPOCH_SECS))
    }

    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// The instant `days` days before this one.
    #[must_use]
    pub fn days_before(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Wraps an existing chrono value.
    #[must_use]
    pub const fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying chrono value.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Canonical text form, e.g. `2024-01-01T00:00:00Z` or
    /// `2024-01-01T00:00:00.123456Z`. Sub-second digits are kept in
    /// groups of three so the cursor names the exact instant stored.
    #[must_use]
    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Parses RFC 3339 text or a bare `YYYY-MM-DD` date (midnight UTC).
    pub fn parse(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(Utc.from_utc_datetime(&naive)));
            }
        }
        Err(Error::InvalidTimestamp(s.to_string()))
    }

    /// Returns the latest timestamp in `iter`, if any.
    pub fn max_of<'a>(iter: impl IntoIterator<Item = &'a Timestamp>) -> Option<Timestamp> {
        iter.into_iter().max().copied()
    }

    /// Returns true if this timestamp lies within `days` of `now`.
    #[must_use]
    pub fn is_within_days_of(&self, now: &Timestamp, days: i64) -> bool {
        now.0 - self.0 <= Duration::days(days)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for optional timestamps such as `deleted_at`.
///
/// Older API versions send `""` for "not deleted"; both that and `null`
/// read as `None`.
pub mod optional {
    use super::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Timestamp::parse(&s).map(Some).map_err(serde::de::Error::custom),
        }
    }

    pub fn serialize<S: Serializer>(
        value: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_iso()),
            None => serializer.serialize_none(),
        }
    }
}
