use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::analytics::aggregator::{build_report, compute_stats, round_ctr};
use crate::analytics::models::{BannerAnalyticsReport, BannerStats, ClickRecord, ViewRecord};
use crate::analytics::normalize::{build_banner, build_click_record, build_view_record};
use crate::analytics::tracking::{
    click_document, event_id, format_timestamp, view_document, TrackClickInput, TrackViewInput,
};
use crate::models::{Banner, BannerKind, BannerPatch, BannerWithStats, NewBanner};
use crate::storage::{Document, Storage};

use super::{require_id, ServiceError, ServiceResult};

pub struct BannerService {
    storage: Arc<dyn Storage>,
}

impl BannerService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// All banners of a kind ordered by rank. Store failures are logged and
    /// yield an empty list so the admin screen still renders.
    pub async fn list_banners(&self, kind: BannerKind) -> Vec<Banner> {
        match self.load_banners(kind).await {
            Ok(banners) => banners,
            Err(e) => {
                error!("Failed to list {}s: {}", kind.label(), e);
                Vec::new()
            }
        }
    }

    async fn load_banners(&self, kind: BannerKind) -> ServiceResult<Vec<Banner>> {
        let docs = self.storage.list_documents(kind.collection()).await?;
        let mut banners: Vec<Banner> = docs.iter().map(build_banner).collect();
        banners.sort_by_key(|banner| banner.rank);
        Ok(banners)
    }

    pub async fn get_banner(&self, kind: BannerKind, banner_id: &str) -> ServiceResult<Option<Banner>> {
        let banner_id = require_id(banner_id, "bannerId")?;
        let doc = self
            .storage
            .get_document(kind.collection(), &banner_id)
            .await?;
        Ok(doc.as_ref().map(build_banner))
    }

    pub async fn create_banner(&self, kind: BannerKind, banner: NewBanner) -> ServiceResult<String> {
        banner.validate().map_err(ServiceError::Validation)?;

        let id = self
            .storage
            .add_document(kind.collection(), &banner.to_document(Utc::now()))
            .await?;

        info!(banner_id = %id, "Created {}", kind.label());
        Ok(id)
    }

    /// Returns false when the banner does not exist
    pub async fn update_banner(
        &self,
        kind: BannerKind,
        banner_id: &str,
        patch: BannerPatch,
    ) -> ServiceResult<bool> {
        let banner_id = require_id(banner_id, "bannerId")?;
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::Validation(
                "Banner title must not be empty".to_string(),
            ));
        }

        let updated = self
            .storage
            .merge_document(kind.collection(), &banner_id, &patch.to_patch(Utc::now()))
            .await?;

        if updated {
            info!(banner_id = %banner_id, "Updated {}", kind.label());
        }
        Ok(updated)
    }

    pub async fn set_banner_active(
        &self,
        kind: BannerKind,
        banner_id: &str,
        is_active: bool,
    ) -> ServiceResult<bool> {
        let banner_id = require_id(banner_id, "bannerId")?;
        let patch = json!({
            "isActive": is_active,
            "updatedAt": format_timestamp(Utc::now()),
        });

        let updated = self
            .storage
            .merge_document(kind.collection(), &banner_id, &patch)
            .await?;

        if updated {
            info!(
                banner_id = %banner_id,
                "{} {}",
                kind.label(),
                if is_active { "activated" } else { "deactivated" }
            );
        }
        Ok(updated)
    }

    /// Delete a banner together with its tracked views and clicks
    pub async fn delete_banner(&self, kind: BannerKind, banner_id: &str) -> ServiceResult<bool> {
        let banner_id = require_id(banner_id, "bannerId")?;

        let deleted = self
            .storage
            .delete_document(kind.collection(), &banner_id)
            .await?;
        if !deleted {
            return Ok(false);
        }

        let views = self
            .storage
            .delete_collection(&kind.views_collection(&banner_id))
            .await?;
        let clicks = self
            .storage
            .delete_collection(&kind.analytics_collection(&banner_id))
            .await?;

        info!(
            banner_id = %banner_id,
            views_removed = views,
            clicks_removed = clicks,
            "Deleted {}",
            kind.label()
        );
        Ok(true)
    }

    /// Record an impression. Returns the view id.
    pub async fn track_view(
        &self,
        kind: BannerKind,
        banner_id: &str,
        user_id: &str,
        input: TrackViewInput,
    ) -> ServiceResult<String> {
        let (banner_id, user_id) = require_ids(banner_id, user_id)?;
        let now = Utc::now();
        let view_id = event_id(&banner_id, &user_id, now);

        let doc = view_document(&view_id, &banner_id, &user_id, input, now);
        self.storage
            .set_document(&kind.views_collection(&banner_id), &view_id, &doc)
            .await?;

        debug!(banner_id = %banner_id, view_id = %view_id, "Tracked {} view", kind.label());
        Ok(view_id)
    }

    /// Record a click. Returns the analytics id.
    pub async fn track_click(
        &self,
        kind: BannerKind,
        banner_id: &str,
        user_id: &str,
        input: TrackClickInput,
    ) -> ServiceResult<String> {
        let (banner_id, user_id) = require_ids(banner_id, user_id)?;
        let now = Utc::now();
        let analytics_id = event_id(&banner_id, &user_id, now);

        let doc = click_document(kind, &analytics_id, &banner_id, &user_id, input, now);
        self.storage
            .set_document(&kind.analytics_collection(&banner_id), &analytics_id, &doc)
            .await?;

        debug!(
            banner_id = %banner_id,
            analytics_id = %analytics_id,
            "Tracked {} click",
            kind.label()
        );
        Ok(analytics_id)
    }

    pub async fn fetch_views(&self, kind: BannerKind, banner_id: &str) -> ServiceResult<Vec<ViewRecord>> {
        let docs = self
            .storage
            .list_documents(&kind.views_collection(banner_id))
            .await?;
        Ok(docs.iter().map(|doc| build_view_record(banner_id, doc)).collect())
    }

    pub async fn fetch_clicks(&self, kind: BannerKind, banner_id: &str) -> ServiceResult<Vec<ClickRecord>> {
        let docs = self
            .storage
            .list_documents(&kind.analytics_collection(banner_id))
            .await?;
        Ok(docs.iter().map(|doc| build_click_record(banner_id, doc)).collect())
    }

    /// Totals and CTR for a banner. A blank `user_id` is treated as absent.
    pub async fn banner_stats(
        &self,
        kind: BannerKind,
        banner_id: &str,
        user_id: Option<&str>,
    ) -> ServiceResult<BannerStats> {
        let banner_id = require_id(banner_id, "bannerId")?;
        let user_id = user_id.map(str::trim).filter(|u| !u.is_empty());

        let views = self.fetch_views(kind, &banner_id).await?;
        let clicks = self.fetch_clicks(kind, &banner_id).await?;

        Ok(compute_stats(&views, &clicks, user_id))
    }

    /// Events of one subcollection, narrowed to a single user when one is given
    async fn list_events(
        &self,
        collection: &str,
        user_id: Option<&str>,
    ) -> ServiceResult<Vec<Document>> {
        let docs = match user_id.map(str::trim).filter(|u| !u.is_empty()) {
            Some(user_id) => {
                self.storage
                    .find_documents(collection, "userId", user_id)
                    .await?
            }
            None => self.storage.list_documents(collection).await?,
        };
        Ok(docs)
    }

    /// View records and per-user summaries, optionally for one user only
    pub async fn views_detail(
        &self,
        kind: BannerKind,
        banner_id: &str,
        user_id: Option<&str>,
    ) -> ServiceResult<BannerAnalyticsReport> {
        let banner_id = require_id(banner_id, "bannerId")?;
        let docs = self
            .list_events(&kind.views_collection(&banner_id), user_id)
            .await?;
        let views = docs
            .iter()
            .map(|doc| build_view_record(&banner_id, doc))
            .collect();
        Ok(build_report(&banner_id, None, views, Vec::new()))
    }

    pub async fn clicks_detail(
        &self,
        kind: BannerKind,
        banner_id: &str,
        user_id: Option<&str>,
    ) -> ServiceResult<BannerAnalyticsReport> {
        let banner_id = require_id(banner_id, "bannerId")?;
        let docs = self
            .list_events(&kind.analytics_collection(&banner_id), user_id)
            .await?;
        let clicks = docs
            .iter()
            .map(|doc| build_click_record(&banner_id, doc))
            .collect();
        Ok(build_report(&banner_id, None, Vec::new(), clicks))
    }

    /// Views and clicks with their summaries plus the banner title
    pub async fn analytics_report(
        &self,
        kind: BannerKind,
        banner_id: &str,
    ) -> ServiceResult<BannerAnalyticsReport> {
        let banner_id = require_id(banner_id, "bannerId")?;

        let title = self
            .storage
            .get_document(kind.collection(), &banner_id)
            .await?
            .map(|doc| build_banner(&doc).title)
            .filter(|title| !title.is_empty());
        let views = self.fetch_views(kind, &banner_id).await?;
        let clicks = self.fetch_clicks(kind, &banner_id).await?;

        Ok(build_report(&banner_id, title, views, clicks))
    }

    /// Banners of a kind with their view and click counters
    pub async fn banners_with_stats(&self, kind: BannerKind) -> ServiceResult<Vec<BannerWithStats>> {
        let banners = self.load_banners(kind).await?;
        let mut result = Vec::with_capacity(banners.len());

        for banner in banners {
            let id = banner.banner_id.as_str();
            let views = self.count_or_zero(&kind.views_collection(id)).await;
            let clicks = self.count_or_zero(&kind.analytics_collection(id)).await;

            result.push(BannerWithStats {
                analytics: compute_counts(views, clicks),
                banner,
            });
        }

        Ok(result)
    }

    async fn count_or_zero(&self, collection: &str) -> u64 {
        self.storage
            .count_documents(collection)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to count {}: {}", collection, e);
                0
            })
    }
}

fn compute_counts(total_views: u64, total_clicks: u64) -> BannerStats {
    BannerStats {
        total_views,
        total_clicks,
        ctr: round_ctr(total_clicks, total_views),
        user_views: None,
        user_clicks: None,
    }
}

fn require_ids(banner_id: &str, user_id: &str) -> ServiceResult<(String, String)> {
    if banner_id.trim().is_empty() || user_id.trim().is_empty() {
        return Err(ServiceError::Validation(
            "bannerId and userId are required".to_string(),
        ));
    }
    Ok((banner_id.trim().to_string(), user_id.trim().to_string()))
}
