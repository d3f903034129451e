//! Integration tests for the banner and analytics HTTP API
//!
//! Requests are sent straight to the router with `oneshot`, backed by an
//! in-memory SQLite store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use stationery_admin::api::{create_api_router, AppState};
use stationery_admin::auth::{issue_token, AuthService, SESSION_COOKIE};
use stationery_admin::config::{
    AnalyticsConfig, AuthConfig, AuthMode, CacheConfig, Config, DatabaseBackend, DatabaseConfig,
    ServerConfig,
};
use stationery_admin::storage::{SqliteStorage, Storage};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn create_test_config(auth: AuthConfig) -> Config {
    Config {
        database: DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        },
        api_server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        auth,
        cache: CacheConfig::default(),
        analytics: AnalyticsConfig::default(),
    }
}

fn jwt_auth() -> AuthConfig {
    AuthConfig {
        mode: AuthMode::Jwt,
        jwt_secret: Some(SECRET.to_string()),
        issuer: None,
        leeway_secs: 0,
    }
}

async fn create_app(auth: AuthConfig) -> (Router, Arc<dyn Storage>) {
    let storage = create_test_storage().await;
    let config = create_test_config(auth);
    let auth_service = Arc::new(AuthService::new(&config.auth).unwrap());
    let state = Arc::new(AppState::new(Arc::clone(&storage), &config));
    (create_api_router(state, auth_service), storage)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "integration-test/1.0")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn create_banner(app: &Router, collection: &str, title: &str, rank: i64) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            &format!("/api/{}", collection),
            json!({"title": title, "imageUrl": "https://cdn.example.com/b.png", "rank": rank}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["bannerId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_app(AuthConfig::disabled()).await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_banner_crud_flow() {
    let (app, _) = create_app(AuthConfig::disabled()).await;

    let second = create_banner(&app, "banners", "Notebooks", 2).await;
    let first = create_banner(&app, "banners", "Pens", 1).await;

    let (status, body) = send(&app, get("/api/banners")).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["bannerId"], first.as_str(), "Ordered by rank");
    assert_eq!(list[1]["bannerId"], second.as_str());
    assert_eq!(list[0]["isActive"], true);
    assert_eq!(list[0]["view_change_time"], 5);

    let (status, _) = send(
        &app,
        json_request("PATCH", &format!("/api/banners/{}", first), json!({"rank": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/banners/{}/status", second),
            json!({"isActive": false}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Banner deactivated successfully");

    let (_, body) = send(&app, get("/api/banners")).await;
    let list = body.as_array().unwrap();
    assert_eq!(list[0]["bannerId"], second.as_str());
    assert_eq!(list[0]["isActive"], false);

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/banners/{}", first))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/banners/{}", first))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_create_banner_validation() {
    let (app, _) = create_app(AuthConfig::disabled()).await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/banners", json!({"title": "  ", "imageUrl": "x.png"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/banners", json!({"imageUrl": "x.png"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_track_view_and_stats() {
    let (app, _) = create_app(AuthConfig::disabled()).await;
    let banner = create_banner(&app, "banners", "Pens", 1).await;

    for (user, city) in [("u1", "Delhi"), ("u1", "Mumbai"), ("u2", "Pune")] {
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/banners/track-view",
                json!({
                    "bannerId": banner,
                    "userId": user,
                    "userEmail": format!("{}@example.com", user),
                    "city": city,
                    "country": "India",
                    "view_duration_seconds": 4.5,
                    "source": "home_carousel"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "View tracked successfully");
        assert!(body["viewId"]
            .as_str()
            .unwrap()
            .starts_with(&format!("{}_", banner)));
        // Event ids carry millisecond timestamps
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
    }

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/banners/track-analytics",
            json!({
                "bannerId": banner,
                "userId": "u2",
                "clickData": {"clickUrl": "/products/pens", "clickType": "internal"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Analytics tracked successfully");
    assert!(body["analyticsId"].is_string());

    let (status, body) = send(&app, get(&format!("/api/banners/{}/stats", banner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Stats retrieved successfully");
    assert_eq!(body["stats"]["totalViews"], 3);
    assert_eq!(body["stats"]["totalClicks"], 1);
    assert_eq!(body["stats"]["ctr"], 33.33);
    assert!(body["stats"].get("userViews").is_none());

    let (_, body) = send(
        &app,
        get(&format!("/api/banners/{}/stats?userId=u1", banner)),
    )
    .await;
    assert_eq!(body["stats"]["userViews"], 2);
    assert_eq!(body["stats"]["userClicks"], 0);
}

#[tokio::test]
async fn test_view_and_click_detail() {
    let (app, _) = create_app(AuthConfig::disabled()).await;
    let banner = create_banner(&app, "banners", "Pens", 1).await;

    for (user, duration) in [("u1", 5), ("u2", 10), ("u2", 15)] {
        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/banners/track-view",
                json!({
                    "bannerId": banner,
                    "userId": user,
                    "city": "Delhi",
                    "country": "India",
                    "view_duration_seconds": duration
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
    }
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/banners/track-analytics",
            json!({"bannerId": banner, "userId": "u1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get(&format!("/api/banners/{}/views", banner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalViews"], 3);
    assert_eq!(body["uniqueViewers"], 2);
    let summary = body["viewsSummary"].as_array().unwrap();
    assert_eq!(summary[0]["userId"], "u2");
    assert_eq!(summary[0]["viewCount"], 2);
    assert_eq!(summary[0]["totalDurationSeconds"], 25.0);
    assert_eq!(summary[0]["locations"], json!(["Delhi, India"]));
    assert_eq!(summary[0]["devices"], json!(["integration-test/1.0"]));

    let (status, body) = send(
        &app,
        get(&format!("/api/banners/{}/views?userId=u1", banner)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalViews"], 1);
    assert_eq!(body["uniqueViewers"], 1);
    assert_eq!(body["views"][0]["userId"], "u1");
    assert_eq!(body["views"][0]["view_duration_seconds"], 5.0);

    let (_, body) = send(
        &app,
        get(&format!("/api/banners/{}/analytics?userId=u2", banner)),
    )
    .await;
    assert_eq!(body["totalClicks"], 0);
    assert_eq!(body["analytics"], json!([]));

    let (status, body) = send(&app, get(&format!("/api/banners/{}/analytics", banner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalClicks"], 1);
    assert_eq!(body["uniqueClickers"], 1);
    assert_eq!(body["analytics"][0]["clickType"], "external");

    let (status, body) = send(&app, get(&format!("/api/banners/{}/report", banner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bannerTitle"], "Pens");
    assert_eq!(body["totalViews"], 3);
    assert_eq!(body["totalClicks"], 1);

    let (status, body) = send(&app, get("/api/banners/with-stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["analytics"]["totalViews"], 3);
    assert_eq!(body[0]["analytics"]["totalClicks"], 1);
    assert_eq!(body[0]["analytics"]["ctr"], 33.33);
}

#[tokio::test]
async fn test_tracking_requires_ids() {
    let (app, _) = create_app(AuthConfig::disabled()).await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/banners/track-view", json!({"bannerId": "b1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "bannerId and userId are required");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment-banners/track-view",
            json!({"paymentBannerId": "", "userId": "u1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "paymentBannerId and userId are required");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment-banners/track-analytics",
            json!({"paymentBannerId": "pb1", "userId": "u1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "paymentBannerId, userId, and clickData are required"
    );

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/banners/track-analytics",
            json!({"bannerId": "b1", "userId": "u1", "clickData": {"clickType": "teleport"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_banner_tracking() {
    let (app, _) = create_app(AuthConfig::disabled()).await;
    let banner = create_banner(&app, "payment-banners", "UPI cashback", 1).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment-banners/track-analytics",
            json!({
                "paymentBannerId": banner,
                "userId": "u9",
                "clickData": {"paymentMethod": "upi", "clickUrl": "/checkout"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = send(
        &app,
        get(&format!("/api/payment-banners/{}/analytics", banner)),
    )
    .await;
    let click = &body["analytics"][0];
    assert_eq!(click["clickType"], "external_link");
    assert_eq!(click["paymentMethod"], "upi");
    assert_eq!(click["userAgent"], "integration-test/1.0");

    let (_, body) = send(&app, get("/api/banners")).await;
    assert_eq!(body, json!([]), "Collections are separate");
}

#[tokio::test]
async fn test_delete_removes_events() {
    let (app, storage) = create_app(AuthConfig::disabled()).await;
    let banner = create_banner(&app, "banners", "Pens", 1).await;

    send(
        &app,
        json_request(
            "POST",
            "/api/banners/track-view",
            json!({"bannerId": banner, "userId": "u1"}),
        ),
    )
    .await;
    let views = format!("banners/{}/views", banner);
    assert_eq!(storage.count_documents(&views).await.unwrap(), 1);

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/banners/{}", banner))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(storage.count_documents(&views).await.unwrap(), 0);
}

#[tokio::test]
async fn test_dashboard_stats_are_cached() {
    let (app, storage) = create_app(AuthConfig::disabled()).await;

    storage
        .add_document("users", &json!({"email": "a@example.com"}))
        .await
        .unwrap();
    storage
        .add_document("products", &json!({"name": "Gel pen"}))
        .await
        .unwrap();

    let (status, body) = send(&app, get("/api/dashboard/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["usersCount"], 1);
    assert_eq!(body["productsCount"], 1);
    assert_eq!(body["ordersCount"], 0);
    assert_eq!(body["bannersCount"], 0);

    storage
        .add_document("users", &json!({"email": "b@example.com"}))
        .await
        .unwrap();
    let (_, body) = send(&app, get("/api/dashboard/stats")).await;
    assert_eq!(body["usersCount"], 1, "Served from cache");

    // Creating a banner invalidates the cached counters
    create_banner(&app, "banners", "Pens", 1).await;
    let (_, body) = send(&app, get("/api/dashboard/stats")).await;
    assert_eq!(body["usersCount"], 2);
    assert_eq!(body["bannersCount"], 1);
}

#[tokio::test]
async fn test_jwt_protects_admin_routes() {
    let (app, _) = create_app(jwt_auth()).await;

    let (status, body) = send(&app, get("/api/banners/with-stats")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"success": false, "message": "Unauthorized"}));

    let (status, _) = send(&app, get("/api/dashboard/stats")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/banners/with-stats")
            .header(header::AUTHORIZATION, "Bearer not-a-token")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = issue_token(SECRET, "admin-1", Some("admin@example.com"), None, 600).unwrap();

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/banners/with-stats")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/dashboard/stats")
            .header(header::COOKIE, format!("theme=dark; {}={}", SESSION_COOKIE, token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_public_routes_skip_auth() {
    let (app, _) = create_app(jwt_auth()).await;

    let (status, _) = send(&app, get("/api/banners")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/banners/track-view",
            json!({"bannerId": "b1", "userId": "u1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/api/banners/b1/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["totalViews"], 1);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/banners",
            json!({"title": "Pens", "imageUrl": "x.png"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
