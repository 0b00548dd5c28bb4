mod config;
mod db;
mod frame;
mod model;
mod routes;
mod services;
mod state;
mod storage;

use std::sync::Arc;

use crate::storage::{MemoryStorage, PgStorage, StorageArea};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let storage: Arc<dyn StorageArea> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgStorage::new(pool))
        }
        None => {
            tracing::warn!(quota_bytes = config.storage_quota_bytes, "DATABASE_URL not set; using in-memory storage");
            Arc::new(MemoryStorage::with_quota(config.storage_quota_bytes))
        }
    };
    let state = state::AppState::new(storage, config);

    match services::images::purge_outdated(&state).await {
        Ok(removed) => tracing::info!(removed, "outdated job images purged"),
        Err(e) => tracing::warn!(error = %e, "job image purge failed"),
    }

    // Spawn background dashboard poll task.
    let _dashboard_poll = services::dashboard::spawn_dashboard_poll_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "shalom-messaging listening");
    axum::serve(listener, app).await.expect("server failed");
}
