use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{auth_middleware, AuthService};
use crate::models::BannerKind;

use super::analytics::{
    analytics_report, banner_stats, clicks_detail, track_click, track_view, views_detail,
};
use super::handlers::{
    create_banner, dashboard_stats, delete_banner, health_check, list_banners,
    list_banners_with_stats, set_banner_status, update_banner, AppState, KindState,
};

/// Routes for one banner collection, mounted at `/api/{collection}`
fn banner_router(kind: BannerKind, state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let ctx = Arc::new(KindState { kind, app: state });

    // Called by storefront clients without an admin session
    let public_routes = Router::new()
        .route("/", get(list_banners))
        .route("/track-view", post(track_view))
        .route("/track-analytics", post(track_click))
        .route("/{id}/stats", get(banner_stats))
        .with_state(Arc::clone(&ctx));

    let protected_routes = Router::new()
        .route("/", post(create_banner))
        .route("/with-stats", get(list_banners_with_stats))
        .route("/{id}", patch(update_banner).delete(delete_banner))
        .route("/{id}/status", put(set_banner_status))
        .route("/{id}/views", get(views_detail))
        .route("/{id}/analytics", get(clicks_detail))
        .route("/{id}/report", get(analytics_report))
        .route_layer(middleware::from_fn_with_state(auth_service, auth_middleware))
        .with_state(ctx);

    public_routes.merge(protected_routes)
}

pub fn create_api_router(state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let dashboard_routes = Router::new()
        .route("/api/dashboard/stats", get(dashboard_stats))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&auth_service),
            auth_middleware,
        ))
        .with_state(Arc::clone(&state));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(dashboard_routes);

    for kind in BannerKind::ALL {
        router = router.nest(
            &format!("/api/{}", kind.collection()),
            banner_router(kind, Arc::clone(&state), Arc::clone(&auth_service)),
        );
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
