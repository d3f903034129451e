//! Boundary adapters from loosely-typed store documents to strict records
//!
//! Every default for a missing or malformed field is applied here and
//! nowhere else. None of these functions fail: absent strings become `""`,
//! absent numbers become `0` and absent timestamps become the current time.
//! The last one loses precision for historical records, which only affects
//! display of records that lack a timestamp.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::analytics::models::{ClickRecord, ClickType, ViewRecord};
use crate::models::banner::{Banner, DEFAULT_VIEW_CHANGE_TIME};
use crate::storage::Document;

/// Read a top-level string field, defaulting to `""`
pub fn string_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Read a string field, falling back to the same key inside `metadata`
fn string_field_or_metadata(data: &Value, key: &str) -> String {
    let value = string_field(data, key);
    if !value.is_empty() {
        return value;
    }
    data.get("metadata")
        .map(|metadata| string_field(metadata, key))
        .unwrap_or_default()
}

/// Read a numeric field. Non-numbers and non-finite values yield `None`.
pub fn number_field(data: &Value, key: &str) -> Option<f64> {
    data.get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 strings, epoch milliseconds and timestamp objects of
/// the form `{"_seconds", "_nanoseconds"}` or `{"seconds", "nanos"}`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::Object(obj) => {
            let seconds = obj
                .get("_seconds")
                .or_else(|| obj.get("seconds"))
                .and_then(Value::as_i64)?;
            let nanos = obj
                .get("_nanoseconds")
                .or_else(|| obj.get("nanos"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).unwrap_or(0))
        }
        _ => None,
    }
}

/// Read a timestamp field, defaulting to now
pub fn timestamp_field(data: &Value, key: &str) -> DateTime<Utc> {
    data.get(key)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now)
}

fn metadata_field(data: &Value) -> Value {
    match data.get("metadata") {
        Some(Value::Object(obj)) => Value::Object(obj.clone()),
        _ => Value::Object(Map::new()),
    }
}

/// Normalize a raw view document of the given banner
pub fn build_view_record(banner_id: &str, doc: &Document) -> ViewRecord {
    let data = &doc.data;

    ViewRecord {
        view_id: doc.id.clone(),
        banner_id: banner_id.to_string(),
        user_id: string_field(data, "userId"),
        user_email: string_field(data, "userEmail"),
        viewed_at: timestamp_field(data, "viewedAt"),
        city: string_field(data, "city"),
        region: string_field(data, "region"),
        country: string_field(data, "country"),
        view_duration_seconds: number_field(data, "view_duration_seconds")
            .map(|secs| secs.max(0.0))
            .unwrap_or(0.0),
        ip_address: string_field(data, "ipAddress"),
        source: string_field_or_metadata(data, "source"),
        user_agent: string_field_or_metadata(data, "userAgent"),
        metadata: metadata_field(data),
    }
}

/// Normalize a raw click document of the given banner
pub fn build_click_record(banner_id: &str, doc: &Document) -> ClickRecord {
    let data = &doc.data;

    ClickRecord {
        analytics_id: doc.id.clone(),
        banner_id: banner_id.to_string(),
        user_id: string_field(data, "userId"),
        user_email: string_field(data, "userEmail"),
        clicked_at: timestamp_field(data, "clickedAt"),
        city: string_field(data, "city"),
        region: string_field(data, "region"),
        country: string_field(data, "country"),
        ip_address: string_field(data, "ipAddress"),
        user_agent: string_field_or_metadata(data, "userAgent"),
        source: string_field_or_metadata(data, "source"),
        click_url: string_field(data, "clickUrl"),
        click_type: ClickType::parse(&string_field(data, "clickType")),
        payment_method: string_field(data, "paymentMethod"),
        metadata: metadata_field(data),
    }
}

/// Normalize a stored banner document. Zero or missing `view_change_time`
/// falls back to the default.
pub fn build_banner(doc: &Document) -> Banner {
    let data = &doc.data;

    Banner {
        banner_id: doc.id.clone(),
        title: string_field(data, "title"),
        image_url: string_field(data, "imageUrl"),
        link_to: string_field(data, "linkTo"),
        rank: number_field(data, "rank").map(|n| n as i64).unwrap_or(0),
        is_active: data.get("isActive").and_then(Value::as_bool).unwrap_or(true),
        view_change_time: number_field(data, "view_change_time")
            .filter(|secs| *secs >= 1.0)
            .map(|secs| secs as u64)
            .unwrap_or(DEFAULT_VIEW_CHANGE_TIME),
        created_at: timestamp_field(data, "createdAt"),
        updated_at: timestamp_field(data, "updatedAt"),
    }
}
