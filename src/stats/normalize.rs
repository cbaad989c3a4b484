//! Shape-tolerant normalization of upstream download records
//!
//! Upstream services disagree on field names and payload layout. Records are
//! reduced to `(date, count)` pairs using the alias lists below, checked in
//! order, and collected into a [`Series`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::stats::types::Series;

/// Keys that may hold the day of a record, in priority order
pub const DATE_KEYS: [&str; 3] = ["date", "day", "key"];

/// Keys that may hold the download count of a record, in priority order
pub const COUNT_KEYS: [&str; 4] = ["downloads", "count", "value", "downloads_count"];

/// Normalizes a list of loosely shaped records into a series.
///
/// Non-object entries and entries whose date or count cannot be read are
/// discarded.
pub fn normalize_entries(entries: &[Value]) -> Series {
    Series::from_observations(entries.iter().filter_map(|entry| {
        let record = entry.as_object()?;
        let date = first_present(record, &DATE_KEYS).and_then(parse_date)?;
        let count = first_present(record, &COUNT_KEYS).and_then(parse_count)?;
        Some((date, count))
    }))
}

/// Extracts the record list from an aggregator payload.
///
/// Accepted shapes: `[...]`, `{"data": [...]}`, `{"data": {"downloads": [...]}}`.
pub fn aggregator_entries(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(entries) => entries,
        Value::Object(object) => match object.get("data") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Object(data)) => match data.get("downloads") {
                Some(Value::Array(entries)) => entries,
                _ => &[],
            },
            _ => &[],
        },
        _ => &[],
    }
}

/// Extracts the record list from a downloads-service payload.
///
/// Accepted shapes:
/// - `{"downloads": {"daily": [...]}}`
/// - `{"downloads": {"2024-01-01": 10, ...}}`
/// - `{"downloads": {"2024-01-01": {"1.0.0": 4, "1.1.0": 6}, ...}}` (per-version counts are summed)
/// - `{"daily": [...]}`, `{"data": [...]}` or `[...]`
pub fn downloads_service_entries(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(entries) => entries.clone(),
        Value::Object(object) => match object.get("downloads") {
            Some(Value::Object(downloads)) => match downloads.get("daily") {
                Some(Value::Array(daily)) => daily.clone(),
                _ => date_mapping_entries(downloads),
            },
            _ => match (object.get("daily"), object.get("data")) {
                (Some(Value::Array(daily)), _) => daily.clone(),
                (_, Some(Value::Array(data))) => data.clone(),
                _ => Vec::new(),
            },
        },
        _ => Vec::new(),
    }
}

fn date_mapping_entries(downloads: &Map<String, Value>) -> Vec<Value> {
    downloads
        .iter()
        .map(|(date, value)| {
            let count = match value {
                Value::Object(per_version) => {
                    Value::from(per_version.values().filter_map(parse_count).sum::<i64>())
                }
                other => other.clone(),
            };
            let mut record = Map::new();
            record.insert("date".to_string(), Value::String(date.clone()));
            record.insert("downloads".to_string(), count);
            Value::Object(record)
        })
        .collect()
}

fn first_present<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// Parses `YYYY-MM-DD` or an ISO 8601 date-time, keeping the date part
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|datetime| datetime.date())
        .ok()
}

/// Parses an integer, an integral float or a numeric string
pub fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|n| i64::try_from(n).unwrap_or(i64::MAX)))
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}
