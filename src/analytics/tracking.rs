//! Construction of view and click event documents

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::analytics::models::ClickType;
use crate::models::BannerKind;

/// Optional details sent along with a banner view
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackViewInput {
    pub user_email: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub source: Option<String>,
    #[serde(rename = "view_duration_seconds")]
    pub view_duration_seconds: Option<f64>,
    pub metadata: Option<Map<String, Value>>,
}

/// Details of a banner click
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackClickInput {
    pub click_type: Option<ClickType>,
    pub click_url: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub ip_address: Option<String>,
    pub user_email: Option<String>,
    pub user_agent: Option<String>,
    pub source: Option<String>,
    pub payment_method: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

/// 32-bit rolling string hash (`h = h * 31 + c` over UTF-16 code units),
/// returned as its absolute value
pub fn user_hash(user_id: &str) -> u32 {
    user_id
        .encode_utf16()
        .fold(0i32, |h, unit| {
            h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

/// Event id of the form `{bannerId}_{epochMillis}_{userHash}`
pub fn event_id(banner_id: &str, user_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        banner_id,
        at.timestamp_millis(),
        user_hash(user_id)
    )
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn metadata_str(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build the stored document for a view event
pub fn view_document(
    view_id: &str,
    banner_id: &str,
    user_id: &str,
    input: TrackViewInput,
    at: DateTime<Utc>,
) -> Value {
    let metadata = input.metadata.unwrap_or_default();
    let user_agent = input
        .user_agent
        .or_else(|| metadata_str(&metadata, "userAgent"))
        .unwrap_or_default();
    let source = input
        .source
        .or_else(|| metadata_str(&metadata, "source"))
        .unwrap_or_default();

    json!({
        "viewId": view_id,
        "bannerId": banner_id,
        "userId": user_id,
        "userEmail": input.user_email.unwrap_or_default(),
        "viewedAt": format_timestamp(at),
        "city": input.city.unwrap_or_default(),
        "region": input.region.unwrap_or_default(),
        "country": input.country.unwrap_or_default(),
        "ipAddress": input.ip_address.unwrap_or_default(),
        "userAgent": user_agent,
        "source": source,
        "view_duration_seconds": input.view_duration_seconds.unwrap_or(0.0).max(0.0),
        "metadata": metadata,
    })
}

/// Build the stored document for a click event
pub fn click_document(
    kind: BannerKind,
    analytics_id: &str,
    banner_id: &str,
    user_id: &str,
    input: TrackClickInput,
    at: DateTime<Utc>,
) -> Value {
    let metadata = input.metadata.unwrap_or_default();
    let source = input
        .source
        .or_else(|| metadata_str(&metadata, "source"))
        .unwrap_or_default();
    let click_type = input.click_type.unwrap_or(kind.default_click_type());

    let mut doc = json!({
        "analyticsId": analytics_id,
        "bannerId": banner_id,
        "userId": user_id,
        "clickType": click_type.as_str(),
        "clickUrl": input.click_url.unwrap_or_default(),
        "city": input.city.unwrap_or_default(),
        "region": input.region.unwrap_or_default(),
        "country": input.country.unwrap_or_default(),
        "ipAddress": input.ip_address.unwrap_or_default(),
        "userEmail": input.user_email.unwrap_or_default(),
        "userAgent": input.user_agent.unwrap_or_default(),
        "source": source,
        "clickedAt": format_timestamp(at),
        "metadata": metadata,
    });

    if kind == BannerKind::Payment {
        doc["paymentMethod"] = Value::String(input.payment_method.unwrap_or_default());
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::normalize::{build_click_record, build_view_record};
    use crate::storage::Document;

    #[test]
    fn test_user_hash_matches_rolling_hash() {
        assert_eq!(user_hash(""), 0);
        assert_eq!(user_hash("a"), 97);
        assert_eq!(user_hash("ab"), 97 * 31 + 98);
        // overflows 32 bits and wraps negative before taking the absolute value
        assert_eq!(user_hash("user-1234567890"), user_hash("user-1234567890"));
        assert_ne!(user_hash("u1"), user_hash("u2"));
    }

    #[test]
    fn test_event_id_format() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(event_id("b1", "ab", at), "b1_1700000000123_3105");
    }

    #[test]
    fn test_view_document_round_trips_through_normalizer() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!("home_carousel"));
        metadata.insert("userAgent".to_string(), json!("Mozilla/5.0"));
        metadata.insert("carousel_index".to_string(), json!(2));

        let input = TrackViewInput {
            city: Some("Pune".to_string()),
            country: Some("India".to_string()),
            view_duration_seconds: Some(4.0),
            metadata: Some(metadata),
            ..Default::default()
        };

        let data = view_document("v1", "b1", "u1", input, at);
        let record = build_view_record(
            "b1",
            &Document {
                id: "v1".to_string(),
                data,
            },
        );

        assert_eq!(record.user_id, "u1");
        assert_eq!(record.viewed_at, at);
        assert_eq!(record.source, "home_carousel");
        assert_eq!(record.user_agent, "Mozilla/5.0");
        assert_eq!(record.view_duration_seconds, 4.0);
        assert_eq!(record.metadata["carousel_index"], 2);
    }

    #[test]
    fn test_click_document_default_click_type_per_kind() {
        let at = Utc::now();

        let regular = click_document(
            BannerKind::Regular,
            "c1",
            "b1",
            "u1",
            TrackClickInput::default(),
            at,
        );
        assert_eq!(regular["clickType"], "external");
        assert!(regular.get("paymentMethod").is_none());

        let payment = click_document(
            BannerKind::Payment,
            "c2",
            "pb1",
            "u1",
            TrackClickInput {
                payment_method: Some("card".to_string()),
                ..Default::default()
            },
            at,
        );
        assert_eq!(payment["clickType"], "external_link");
        assert_eq!(payment["paymentMethod"], "card");

        let record = build_click_record(
            "pb1",
            &Document {
                id: "c2".to_string(),
                data: payment,
            },
        );
        assert_eq!(record.click_type, Some(ClickType::ExternalLink));
        assert_eq!(record.payment_method, "card");
    }
}
