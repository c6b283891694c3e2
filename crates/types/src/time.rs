//! Timestamp helpers. All persisted timestamps are RFC 3339 UTC strings so
//! that lexicographic order in the store matches chronological order.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// The recency sort key: max(created, modified, deleted), or `None` when all
/// three are "never".
pub fn touched(
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    deleted: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    [created, modified, deleted].into_iter().flatten().max()
}

/// Canonical storage encoding.
pub fn to_store(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn to_store_opt(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(to_store)
}

/// Parse a stored timestamp; malformed values read back as "never".
pub fn from_store(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().and_then(parse)
}

/// Lenient parse of remote timestamps: RFC 3339, or a naive date-time which
/// some calendar payloads emit (assumed UTC).
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
