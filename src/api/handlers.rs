use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::AuthClaims;
use crate::banners::BannerService;
use crate::cache::{MokaTtlCache, TtlCache};
use crate::config::{AnalyticsConfig, Config};
use crate::dashboard::{DashboardService, DashboardStats};
use crate::models::{Banner, BannerKind, BannerPatch, BannerWithStats, NewBanner};
use crate::storage::Storage;

use super::error::{ApiError, ApiResult};

pub struct AppState {
    pub banners: Arc<BannerService>,
    pub dashboard: Arc<DashboardService>,
    pub analytics: AnalyticsConfig,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, config: &Config) -> Self {
        let cache: Arc<dyn TtlCache<DashboardStats>> =
            Arc::new(MokaTtlCache::new(config.cache.max_entries));

        Self {
            banners: Arc::new(BannerService::new(Arc::clone(&storage))),
            dashboard: Arc::new(DashboardService::new(
                storage,
                cache,
                Duration::from_secs(config.cache.dashboard_ttl_secs),
            )),
            analytics: config.analytics.clone(),
        }
    }
}

/// Per-collection handler state
pub struct KindState {
    pub kind: BannerKind,
    pub app: Arc<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub is_active: bool,
}

/// Unwrap a JSON body, reporting malformed input in the error envelope
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))
}

/// List banners of a collection ordered by rank
pub async fn list_banners(State(ctx): State<Arc<KindState>>) -> Json<Vec<Banner>> {
    Json(ctx.app.banners.list_banners(ctx.kind).await)
}

pub async fn list_banners_with_stats(
    State(ctx): State<Arc<KindState>>,
) -> ApiResult<Json<Vec<BannerWithStats>>> {
    let banners = ctx.app.banners.banners_with_stats(ctx.kind).await?;
    Ok(Json(banners))
}

pub async fn create_banner(
    State(ctx): State<Arc<KindState>>,
    Extension(claims): Extension<AuthClaims>,
    payload: Result<Json<NewBanner>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let banner = json_body(payload)?;
    let banner_id = ctx.app.banners.create_banner(ctx.kind, banner).await?;
    info!(sub = %claims.sub, banner_id = %banner_id, "Banner created via API");
    ctx.app.dashboard.invalidate().await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!("{} created successfully", capitalize(ctx.kind.label())),
            "bannerId": banner_id,
        })),
    ))
}

pub async fn update_banner(
    State(ctx): State<Arc<KindState>>,
    Extension(claims): Extension<AuthClaims>,
    Path(banner_id): Path<String>,
    payload: Result<Json<BannerPatch>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let patch = json_body(payload)?;
    if !ctx.app.banners.update_banner(ctx.kind, &banner_id, patch).await? {
        return Err(not_found(ctx.kind));
    }
    info!(sub = %claims.sub, banner_id = %banner_id, "Banner updated via API");

    Ok(Json(json!({
        "success": true,
        "message": format!("{} updated successfully", capitalize(ctx.kind.label())),
    })))
}

pub async fn set_banner_status(
    State(ctx): State<Arc<KindState>>,
    Path(banner_id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let StatusRequest { is_active } = json_body(payload)?;
    if !ctx
        .app
        .banners
        .set_banner_active(ctx.kind, &banner_id, is_active)
        .await?
    {
        return Err(not_found(ctx.kind));
    }

    let action = if is_active { "activated" } else { "deactivated" };
    Ok(Json(json!({
        "success": true,
        "message": format!("{} {} successfully", capitalize(ctx.kind.label()), action),
    })))
}

pub async fn delete_banner(
    State(ctx): State<Arc<KindState>>,
    Extension(claims): Extension<AuthClaims>,
    Path(banner_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !ctx.app.banners.delete_banner(ctx.kind, &banner_id).await? {
        return Err(not_found(ctx.kind));
    }
    info!(sub = %claims.sub, banner_id = %banner_id, "Banner deleted via API");
    ctx.app.dashboard.invalidate().await;

    Ok(Json(json!({
        "success": true,
        "message": format!("{} deleted successfully", capitalize(ctx.kind.label())),
    })))
}

pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> Json<DashboardStats> {
    Json(state.dashboard.stats().await)
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn not_found(kind: BannerKind) -> ApiError {
    ApiError::NotFound(format!("{} not found", capitalize(kind.label())))
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
