use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analytics::models::{BannerStats, ClickType};
use crate::analytics::tracking::format_timestamp;
use crate::storage::subcollection;

pub const DEFAULT_VIEW_CHANGE_TIME: u64 = 5;

/// Regular home banners and payment screen banners share a shape but live
/// in separate collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerKind {
    Regular,
    Payment,
}

impl BannerKind {
    pub const ALL: [BannerKind; 2] = [BannerKind::Regular, BannerKind::Payment];

    pub fn collection(&self) -> &'static str {
        match self {
            BannerKind::Regular => "banners",
            BannerKind::Payment => "payment-banners",
        }
    }

    pub fn views_collection(&self, banner_id: &str) -> String {
        subcollection(self.collection(), banner_id, "views")
    }

    pub fn analytics_collection(&self, banner_id: &str) -> String {
        subcollection(self.collection(), banner_id, "analytics")
    }

    pub fn default_click_type(&self) -> ClickType {
        match self {
            BannerKind::Regular => ClickType::External,
            BannerKind::Payment => ClickType::ExternalLink,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BannerKind::Regular => "banner",
            BannerKind::Payment => "payment banner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub banner_id: String,
    pub title: String,
    pub image_url: String,
    pub link_to: String,
    pub rank: i64,
    pub is_active: bool,
    /// Seconds before the carousel advances
    #[serde(rename = "view_change_time")]
    pub view_change_time: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBanner {
    pub title: String,
    pub image_url: String,
    #[serde(default)]
    pub link_to: String,
    #[serde(default)]
    pub rank: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(rename = "view_change_time", default = "default_view_change_time")]
    pub view_change_time: u64,
}

fn default_active() -> bool {
    true
}

fn default_view_change_time() -> u64 {
    DEFAULT_VIEW_CHANGE_TIME
}

impl NewBanner {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Banner title is required".to_string());
        }
        if self.image_url.trim().is_empty() {
            return Err("Banner image URL is required".to_string());
        }
        Ok(())
    }

    pub fn to_document(&self, now: DateTime<Utc>) -> Value {
        let timestamp = format_timestamp(now);
        serde_json::json!({
            "title": self.title,
            "imageUrl": self.image_url,
            "linkTo": self.link_to,
            "rank": self.rank,
            "isActive": self.is_active,
            "view_change_time": self.view_change_time,
            "createdAt": timestamp,
            "updatedAt": timestamp,
        })
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerPatch {
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub link_to: Option<String>,
    pub rank: Option<i64>,
    pub is_active: Option<bool>,
    #[serde(rename = "view_change_time")]
    pub view_change_time: Option<u64>,
}

impl BannerPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.image_url.is_none()
            && self.link_to.is_none()
            && self.rank.is_none()
            && self.is_active.is_none()
            && self.view_change_time.is_none()
    }

    pub fn to_patch(&self, now: DateTime<Utc>) -> Value {
        let mut patch = Map::new();
        if let Some(title) = &self.title {
            patch.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(image_url) = &self.image_url {
            patch.insert("imageUrl".into(), Value::from(image_url.as_str()));
        }
        if let Some(link_to) = &self.link_to {
            patch.insert("linkTo".into(), Value::from(link_to.as_str()));
        }
        if let Some(rank) = self.rank {
            patch.insert("rank".into(), Value::from(rank));
        }
        if let Some(is_active) = self.is_active {
            patch.insert("isActive".into(), Value::from(is_active));
        }
        if let Some(secs) = self.view_change_time {
            patch.insert("view_change_time".into(), Value::from(secs));
        }
        patch.insert("updatedAt".into(), Value::from(format_timestamp(now)));
        Value::Object(patch)
    }
}

/// A banner with its headline counters for the list screen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerWithStats {
    #[serde(flatten)]
    pub banner: Banner,
    pub analytics: BannerStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_collections() {
        assert_eq!(BannerKind::Regular.views_collection("b1"), "banners/b1/views");
        assert_eq!(
            BannerKind::Payment.analytics_collection("pb1"),
            "payment-banners/pb1/analytics"
        );
    }

    #[test]
    fn test_patch_contains_only_given_fields() {
        let patch = BannerPatch {
            rank: Some(3),
            ..Default::default()
        }
        .to_patch(Utc::now());

        let obj = patch.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["rank"], 3);
        assert!(obj.contains_key("updatedAt"));
    }

    #[test]
    fn test_new_banner_defaults() {
        let banner: NewBanner =
            serde_json::from_str(r#"{"title": "Back to school", "imageUrl": "https://img/1.png"}"#)
                .unwrap();
        assert!(banner.is_active);
        assert_eq!(banner.view_change_time, DEFAULT_VIEW_CHANGE_TIME);
        assert_eq!(banner.rank, 0);
        assert!(banner.validate().is_ok());

        let blank: NewBanner =
            serde_json::from_str(r#"{"title": " ", "imageUrl": "x"}"#).unwrap();
        assert!(blank.validate().is_err());
    }
}
