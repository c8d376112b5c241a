use btcmap_types::Timestamp;
use chrono::{DateTime, Utc};
use proptest::prelude::*;

fn at(secs: i64, nanos: u32) -> Timestamp {
    Timestamp::from_datetime(DateTime::<Utc>::from_timestamp(secs, nanos).unwrap())
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parses_rfc3339_with_millis() {
    let ts = Timestamp::parse("2024-03-01T12:30:00.250Z").unwrap();
    assert_eq!(ts.to_iso(), "2024-03-01T12:30:00.250Z");
}

#[test]
fn parses_offset_and_normalises_to_utc() {
    let ts = Timestamp::parse("2024-03-01T14:30:00+02:00").unwrap();
    assert_eq!(ts.to_iso(), "2024-03-01T12:30:00Z");
}

#[test]
fn parses_bare_date_as_midnight() {
    let ts = Timestamp::parse("2024-01-01").unwrap();
    assert_eq!(ts.to_iso(), "2024-01-01T00:00:00Z");
}

#[test]
fn rejects_garbage() {
    assert!(Timestamp::parse("yesterday").is_err());
    assert!("".parse::<Timestamp>().is_err());
}

// ── Sub-second precision ─────────────────────────────────────────

#[test]
fn microseconds_survive_text_form() {
    let ts = Timestamp::parse("2024-05-01T10:00:00.123456Z").unwrap();
    assert_eq!(ts.to_iso(), "2024-05-01T10:00:00.123456Z");
    assert_eq!(Timestamp::parse(&ts.to_iso()).unwrap(), ts);
}

#[test]
fn nanoseconds_survive_serde() {
    let ts = Timestamp::parse("2024-05-01T10:00:00.000000001Z").unwrap();
    let json = serde_json::to_string(&ts).unwrap();
    assert_eq!(json, "\"2024-05-01T10:00:00.000000001Z\"");
    assert_eq!(serde_json::from_str::<Timestamp>(&json).unwrap(), ts);
}

// ── Constants & helpers ──────────────────────────────────────────

#[test]
fn sync_epoch_is_start_of_2022() {
    assert_eq!(Timestamp::sync_epoch().to_iso(), "2022-01-01T00:00:00Z");
}

#[test]
fn max_of_picks_latest() {
    let a = Timestamp::parse("2024-01-01").unwrap();
    let b = Timestamp::parse("2024-06-01").unwrap();
    let c = Timestamp::parse("2023-12-31").unwrap();
    assert_eq!(Timestamp::max_of([&a, &b, &c]), Some(b));
    assert_eq!(Timestamp::max_of(std::iter::empty()), None);
}

#[test]
fn within_days() {
    let now = Timestamp::now();
    assert!(now.days_before(10).is_within_days_of(&now, 90));
    assert!(!now.days_before(120).is_within_days_of(&now, 90));
}

#[test]
fn days_before_keeps_time_of_day() {
    let ts = Timestamp::parse("2024-03-15T08:30:00.5Z").unwrap();
    assert_eq!(ts.days_before(14).to_iso(), "2024-03-01T08:30:00.500Z");
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn serializes_as_iso_string() {
    let ts = Timestamp::parse("2024-01-01T00:00:00Z").unwrap();
    let json = serde_json::to_string(&ts).unwrap();
    assert_eq!(json, "\"2024-01-01T00:00:00Z\"");
}

// ── Properties ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn canonical_text_parses_back(secs in 0i64..4_000_000_000, nanos in 0u32..1_000_000_000) {
        let ts = at(secs, nanos);
        prop_assert_eq!(Timestamp::parse(&ts.to_iso()).unwrap(), ts);
    }

    #[test]
    fn parsed_order_matches_instant_order(
        a in 0i64..4_000_000_000,
        b in 0i64..4_000_000_000,
        micros in 0u32..1_000_000,
    ) {
        let ta = at(a, micros * 1_000);
        let tb = at(b, 0);
        let pa = Timestamp::parse(&ta.to_iso()).unwrap();
        let pb = Timestamp::parse(&tb.to_iso()).unwrap();
        prop_assert_eq!(pa.cmp(&pb), ta.cmp(&tb));
    }
}
