//! Tracking and banner analytics handlers

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::analytics::ip_extractor::resolve_event_ip;
use crate::analytics::models::{BannerAnalyticsReport, BannerStats};
use crate::analytics::tracking::{TrackClickInput, TrackViewInput};
use crate::models::BannerKind;

use super::error::{ApiError, ApiResult};
use super::handlers::{json_body, KindState};

/// Socket peer address when the server was started with connect info
pub struct ClientAddr(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackViewRequest {
    #[serde(alias = "paymentBannerId")]
    pub banner_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub details: TrackViewInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackClickRequest {
    #[serde(alias = "paymentBannerId")]
    pub banner_id: Option<String>,
    pub user_id: Option<String>,
    pub click_data: Option<TrackClickInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: BannerStats,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: BannerAnalyticsReport,
}

fn id_field_name(kind: BannerKind) -> &'static str {
    match kind {
        BannerKind::Regular => "bannerId",
        BannerKind::Payment => "paymentBannerId",
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn header_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .filter(|ua| !ua.is_empty())
        .map(str::to_string)
}

fn event_ip(ctx: &KindState, headers: &HeaderMap, addr: ClientAddr) -> String {
    let socket_ip = addr.0.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    resolve_event_ip(headers, socket_ip, &ctx.app.analytics)
}

pub async fn track_view(
    State(ctx): State<Arc<KindState>>,
    headers: HeaderMap,
    addr: ClientAddr,
    payload: Result<Json<TrackViewRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = json_body(payload)?;
    let (Some(banner_id), Some(user_id)) =
        (non_blank(request.banner_id), non_blank(request.user_id))
    else {
        return Err(ApiError::BadRequest(format!(
            "{} and userId are required",
            id_field_name(ctx.kind)
        )));
    };

    let mut details = request.details;
    if details.ip_address.is_none() {
        details.ip_address = Some(event_ip(&ctx, &headers, addr));
    }
    let ua_in_metadata = details
        .metadata
        .as_ref()
        .is_some_and(|m| m.get("userAgent").and_then(Value::as_str).is_some());
    if details.user_agent.is_none() && !ua_in_metadata {
        details.user_agent = header_user_agent(&headers);
    }

    let view_id = ctx
        .app
        .banners
        .track_view(ctx.kind, &banner_id, &user_id, details)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "View tracked successfully",
        "viewId": view_id,
    })))
}

pub async fn track_click(
    State(ctx): State<Arc<KindState>>,
    headers: HeaderMap,
    addr: ClientAddr,
    payload: Result<Json<TrackClickRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = json_body(payload)?;
    let banner_id = non_blank(request.banner_id);
    let user_id = non_blank(request.user_id);

    let (banner_id, user_id, click_data) = match (ctx.kind, banner_id, user_id, request.click_data) {
        (BannerKind::Payment, Some(b), Some(u), Some(data)) => (b, u, data),
        (BannerKind::Payment, ..) => {
            return Err(ApiError::BadRequest(
                "paymentBannerId, userId, and clickData are required".to_string(),
            ))
        }
        (BannerKind::Regular, Some(b), Some(u), data) => (b, u, data.unwrap_or_default()),
        (BannerKind::Regular, ..) => {
            return Err(ApiError::BadRequest(
                "bannerId and userId are required".to_string(),
            ))
        }
    };

    let mut click_data = click_data;
    if click_data.ip_address.is_none() {
        click_data.ip_address = Some(event_ip(&ctx, &headers, addr));
    }
    if click_data.user_agent.is_none() {
        click_data.user_agent = header_user_agent(&headers);
    }

    let analytics_id = ctx
        .app
        .banners
        .track_click(ctx.kind, &banner_id, &user_id, click_data)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Analytics tracked successfully",
        "analyticsId": analytics_id,
    })))
}

/// `GET /{id}/stats?userId=`
pub async fn banner_stats(
    State(ctx): State<Arc<KindState>>,
    Path(banner_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<StatsResponse>> {
    let stats = ctx
        .app
        .banners
        .banner_stats(ctx.kind, &banner_id, query.user_id.as_deref())
        .await?;

    Ok(Json(StatsResponse {
        success: true,
        stats,
        message: "Stats retrieved successfully".to_string(),
    }))
}

/// `GET /{id}/views?userId=`
pub async fn views_detail(
    State(ctx): State<Arc<KindState>>,
    Path(banner_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<ReportResponse>> {
    let report = ctx
        .app
        .banners
        .views_detail(ctx.kind, &banner_id, query.user_id.as_deref())
        .await?;
    Ok(Json(ReportResponse {
        success: true,
        report,
    }))
}

/// `GET /{id}/analytics?userId=`
pub async fn clicks_detail(
    State(ctx): State<Arc<KindState>>,
    Path(banner_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<ReportResponse>> {
    let report = ctx
        .app
        .banners
        .clicks_detail(ctx.kind, &banner_id, query.user_id.as_deref())
        .await?;
    Ok(Json(ReportResponse {
        success: true,
        report,
    }))
}

pub async fn analytics_report(
    State(ctx): State<Arc<KindState>>,
    Path(banner_id): Path<String>,
) -> ApiResult<Json<ReportResponse>> {
    let report = ctx
        .app
        .banners
        .analytics_report(ctx.kind, &banner_id)
        .await?;
    Ok(Json(ReportResponse {
        success: true,
        report,
    }))
}
