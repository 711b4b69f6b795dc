//! # packs-api — Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to `PORT` (default 8080).

use packs_api::config::AppConfig;
use packs_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logs = std::env::var("PACKS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Configuration error: {e}");
        e
    })?;
    let policy = config.load_policy().map_err(|e| {
        tracing::error!("Policy load failed: {e}");
        e
    })?;
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set; every request runs as admin");
    }

    // Absent DATABASE_URL means in-memory only.
    let db_pool = packs_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let port = config.port;
    let jobs_enabled = config.jobs_enabled;
    let state = AppState::with_policy(config, policy, db_pool);

    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    if jobs_enabled {
        packs_api::jobs::spawn_scheduler(state.clone());
        tracing::info!("Job scheduler started");
    }

    let app = packs_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Packs API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
