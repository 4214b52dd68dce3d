// =============================================================================
// Sloan Analyst API: Main Entry Point
// =============================================================================
//
// Wires configuration, the historical store, and the Yahoo Finance client into
// an explicitly constructed `AppState`, then serves the REST router until
// Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod config;
mod error;
mod indicators;
mod market_data;
mod period;
mod store;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::AnalystConfig;
use crate::market_data::YahooClient;
use crate::store::HistoricalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AnalystConfig::from_env();
    info!(
        ticker = %config.ticker,
        bind_addr = %config.bind_addr,
        provider = %config.provider_url,
        "Sloan Analyst API starting"
    );

    // ── 2. Historical store ──────────────────────────────────────────────
    let db_path = store::database_path(&config.database_url);
    let store = HistoricalStore::open(&db_path, config.pool_size)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    // ── 3. Market data source ────────────────────────────────────────────
    let source = Arc::new(YahooClient::new(config.provider_url.clone())?);

    // ── 4. Serve ─────────────────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, store, source);
    let app = api::rest::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("Sloan Analyst API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, gracefully stopping…");
}
