//! Timestamp serialization for persisted documents.
//!
//! Documents store UTC timestamps as RFC 3339 with microsecond precision
//! (`2024-01-01T12:00:00.123456Z`); a value carrying sub-microsecond digits
//! is written with nanoseconds so it reads back unchanged. Older documents
//! may contain naive ISO-8601 strings without an offset
//! (`2024-01-01T12:00:00.123456`); those are read as local time. A missing
//! required timestamp decodes to [`unknown`].
//!
//! Use with `#[serde(with = "folio_core::timestamp")]` on `DateTime<Utc>`
//! fields and `#[serde(with = "folio_core::timestamp::option", default)]` on
//! `Option<DateTime<Utc>>` fields.

use chrono::{
    DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc,
};
use serde::{Deserialize, Deserializer, Serializer};

/// Current time at the precision documents persist.
///
/// Truncated to microseconds, the canonical persisted form.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Placeholder for timestamps absent from a stored document: the Unix epoch.
pub fn unknown() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Render a timestamp in the persisted form.
pub fn format(ts: &DateTime<Utc>) -> String {
    let precision = if ts.timestamp_subsec_nanos() % 1_000 == 0 {
        SecondsFormat::Micros
    } else {
        SecondsFormat::Nanos
    };
    ts.to_rfc3339_opts(precision, true)
}

/// Parse a persisted timestamp (RFC 3339, or naive ISO-8601 as local time).
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<NaiveDateTime>().ok().and_then(local_to_utc)
}

/// Parse a task due date.
///
/// Accepts everything [`parse`] does plus a bare `YYYY-MM-DD`, which is read
/// as midnight local time.
pub fn parse_due_date(s: &str) -> Option<DateTime<Utc>> {
    parse(s).or_else(|| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(local_to_utc)
    })
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Same encoding for optional timestamps. `null` and absent both map to `None`.
pub mod option {
    use super::*;

    pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.serialize_some(&format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}
