use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stationery_admin::api::{self, AppState};
use stationery_admin::auth::AuthService;
use stationery_admin::config::{AuthMode, Config};
use stationery_admin::connect_storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    info!("Initializing database...");
    let storage = connect_storage(&config).await?;
    info!("Database initialized successfully");

    let auth_service = Arc::new(AuthService::new(&config.auth)?);
    match config.auth.mode {
        AuthMode::None => {
            info!("🔓 Authentication is disabled - all admin requests are allowed");
        }
        AuthMode::Jwt => {
            info!(
                "🔐 JWT authentication enabled (issuer: {})",
                config.auth.issuer.as_deref().unwrap_or("any")
            );
        }
    }

    info!(
        "📊 Client IP mode: {:?} (anonymization: {})",
        config.analytics.trusted_proxy_mode, config.analytics.ip_anonymization
    );

    let state = Arc::new(AppState::new(storage, &config));
    let app = api::create_api_router(state, auth_service);

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
