pub mod analytics;
pub mod api;
pub mod auth;
pub mod banners;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod models;
pub mod storage;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, DatabaseBackend};
use crate::storage::{PostgresStorage, SqliteStorage, Storage};

/// Connect to the configured backend and create the schema
pub async fn connect_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    storage.init().await?;
    Ok(storage)
}
