//! Data models for banner analytics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a banner click navigates the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickType {
    Internal,
    External,
    AppAction,
    PaymentMethodSelect,
    ExternalLink,
}

impl ClickType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickType::Internal => "internal",
            ClickType::External => "external",
            ClickType::AppAction => "app_action",
            ClickType::PaymentMethodSelect => "payment_method_select",
            ClickType::ExternalLink => "external_link",
        }
    }

    /// Parse a stored click type. Unknown or empty values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "internal" => Some(ClickType::Internal),
            "external" => Some(ClickType::External),
            "app_action" => Some(ClickType::AppAction),
            "payment_method_select" => Some(ClickType::PaymentMethodSelect),
            "external_link" => Some(ClickType::ExternalLink),
            _ => None,
        }
    }
}

/// One banner impression by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecord {
    pub view_id: String,
    pub banner_id: String,
    pub user_id: String,
    pub user_email: String,
    pub viewed_at: DateTime<Utc>,
    pub city: String,
    pub region: String,
    pub country: String,
    #[serde(rename = "view_duration_seconds")]
    pub view_duration_seconds: f64,
    pub ip_address: String,
    pub source: String,
    pub user_agent: String,
    pub metadata: Value,
}

/// One click on a banner by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    pub analytics_id: String,
    pub banner_id: String,
    pub user_id: String,
    pub user_email: String,
    pub clicked_at: DateTime<Utc>,
    pub city: String,
    pub region: String,
    pub country: String,
    pub ip_address: String,
    pub user_agent: String,
    pub source: String,
    pub click_url: String,
    pub click_type: Option<ClickType>,
    /// Only populated for payment banners
    pub payment_method: String,
    pub metadata: Value,
}

/// Per-user rollup of a banner's views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSummary {
    pub user_id: String,
    pub user_email: String,
    pub view_count: u64,
    pub first_viewed: DateTime<Utc>,
    pub last_viewed: DateTime<Utc>,
    pub total_duration_seconds: f64,
    pub locations: Vec<String>,
    pub devices: Vec<String>,
    pub sources: Vec<String>,
}

/// Per-user rollup of a banner's clicks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickSummary {
    pub user_id: String,
    pub user_email: String,
    pub click_count: u64,
    pub first_clicked: DateTime<Utc>,
    pub last_clicked: DateTime<Utc>,
    pub click_urls: Vec<String>,
    pub locations: Vec<String>,
    pub devices: Vec<String>,
    pub sources: Vec<String>,
}

/// Overall counters for one banner, optionally scoped to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerStats {
    pub total_views: u64,
    pub total_clicks: u64,
    /// Click-through rate in percent, rounded to 2 decimals
    pub ctr: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_clicks: Option<u64>,
}

/// Raw records plus their summaries for the detail screens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerAnalyticsReport {
    pub banner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_title: Option<String>,
    pub views: Vec<ViewRecord>,
    pub analytics: Vec<ClickRecord>,
    pub views_summary: Vec<ViewSummary>,
    pub analytics_summary: Vec<ClickSummary>,
    pub total_views: u64,
    pub total_clicks: u64,
    pub unique_viewers: u64,
    pub unique_clickers: u64,
}
