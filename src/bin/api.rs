//! Podium API Server
//!
//! Run with: cargo run --bin podium-api
//!
//! # Configuration
//!
//! Reads `PODIUM_CONFIG` when set, otherwise the usual config locations,
//! then applies environment overrides:
//! - `PODIUM_STORE_BACKEND`: sqlite or rest (default: sqlite)
//! - `PODIUM_DB_PATH`: SQLite database file
//! - `PODIUM_REST_URL` / `PODIUM_REST_API_KEY`: hosted store
//! - `PODIUM_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `PODIUM_API_PORT`: Port to listen on (default: 8082)
//! - `PODIUM_LIVE_SCOPE`: campaign or table (default: campaign)
//! - `PODIUM_LOG_LEVEL` / `PODIUM_LOG_FORMAT`
//! - `RUST_LOG`: Log filter, wins over the configured level

use anyhow::{Context, Result};
use podium::api::{serve, ApiConfig, AppState};
use podium::config::Config;
use podium::store::open_store;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::var_os("PODIUM_CONFIG") {
        Some(path) => Config::load_with_env(&PathBuf::from(path))?,
        None => Config::load_default(),
    };

    if let Err(e) = podium::logging::init(&config.logging) {
        eprintln!("Logging disabled: {}", e);
    }

    tracing::info!("Starting Podium API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        backend = ?config.store.backend,
        scope = %config.live.scope,
        tie_break = ?config.ranking.tie_break,
        "Loaded configuration"
    );

    let opened = open_store(&config.store, true).context("Failed to open campaign store")?;
    let store = opened.store();
    match store.ping().await {
        Ok(()) => tracing::info!(backend = store.backend(), "Campaign store reachable"),
        Err(e) => tracing::warn!(
            backend = store.backend(),
            error = %e,
            "Campaign store not reachable yet (readiness will report it)"
        ),
    }

    let api_config = ApiConfig::from(&config);
    let state = AppState::new(store, api_config.clone());

    serve(state, &api_config).await?;
    drop(opened);

    tracing::info!("Podium API server stopped");
    Ok(())
}
