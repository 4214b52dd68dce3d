// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// Every request is a single linear pipeline: resolve inputs, call the data
// source and/or the historical store, compute, serialise.  No handler keeps
// state between requests.
//
// Status mapping:
//   400: unknown period on fetch, bad/oversized indicator length
//   404: unknown symbol, empty provider result, no stored rows in window
//   500: provider or database failure (cause in the `error` field)
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::indicators;
use crate::market_data::live_series;
use crate::period::Period;
use crate::types::{HistoricalBar, IndicatorKind, PriceSeries};

/// Window of the live (un-stored) SMA endpoint.
const LIVE_SMA_LENGTH: usize = 20;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS, request tracing, and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/:symbol/fetch/:period", post(fetch_and_store))
        .route("/api/:symbol/historical/:period", get(historical))
        .route("/api/:symbol/sma/:period/:length", get(sma))
        .route("/api/:symbol/ema/:period/:length", get(ema))
        .route("/api/:symbol/rsi/:period/:length", get(rsi))
        .route("/api/:symbol/live/sma", get(live_sma))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Liveness
// =============================================================================

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Sloan Analyst API - Hello World!" }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "server_time": chrono::Utc::now().timestamp_millis(),
    }))
}

// =============================================================================
// Shared helpers
// =============================================================================

fn ensure_symbol(state: &AppState, symbol: &str) -> Result<(), ApiError> {
    if state.serves(symbol) {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!(
            "Unknown symbol '{symbol}'; this service tracks {}",
            state.ticker()
        )))
    }
}

/// Stored bars for the configured ticker within `period`, or 404.
async fn load_bars(state: &AppState, symbol: &str, period: &str) -> Result<Vec<HistoricalBar>, ApiError> {
    ensure_symbol(state, symbol)?;

    let store = state.store.clone();
    let ticker = state.ticker().to_string();
    let period = period.to_string();

    tokio::task::spawn_blocking(move || store.query(&period, &ticker))
        .await?
        .ok_or_else(|| ApiError::NotFound("No data found for the given period".to_string()))
}

// =============================================================================
// Fetch + store
// =============================================================================

async fn fetch_and_store(
    State(state): State<Arc<AppState>>,
    Path((symbol, period)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    // Validated before anything touches the provider.
    let period: Period = period.parse()?;
    ensure_symbol(&state, &symbol)?;

    let ticker = state.ticker().to_string();
    let mut bars = state.source.download(&ticker, period).await?;
    for bar in &mut bars {
        bar.ticker.clone_from(&ticker);
    }
    let received = bars.len();

    let store = state.store.clone();
    let inserted = tokio::task::spawn_blocking(move || store.upsert(&bars)).await??;

    info!(ticker = %ticker, %period, received, inserted, "fetch stored");

    Ok(Json(json!({
        "message": format!("Data for {period} fetched and stored successfully."),
        "period": period,
        "received": received,
        "inserted": inserted,
    })))
}

// =============================================================================
// Historical read-back
// =============================================================================

#[derive(Serialize)]
struct BarRow<'a> {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
    ticker: &'a str,
}

async fn historical(
    State(state): State<Arc<AppState>>,
    Path((symbol, period)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let bars = load_bars(&state, &symbol, &period).await?;

    let rows: BTreeMap<NaiveDate, BarRow<'_>> = bars
        .iter()
        .map(|b| {
            (
                b.date,
                BarRow {
                    open: b.open,
                    high: b.high,
                    low: b.low,
                    close: b.close,
                    volume: b.volume,
                    ticker: &b.ticker,
                },
            )
        })
        .collect();

    Ok(Json(serde_json::to_value(rows).map_err(|e| ApiError::Storage(e.to_string()))?))
}

// =============================================================================
// Indicators over stored data
// =============================================================================

async fn indicator(
    kind: IndicatorKind,
    state: &AppState,
    symbol: &str,
    period: &str,
    length: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    let length: usize = length
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid indicator length '{length}'")))?;

    let bars = load_bars(state, symbol, period).await?;
    let series = PriceSeries::from(bars.as_slice());
    let values = indicators::compute(kind, &series, length)?;

    Ok(Json(json!({ (kind.key()): values })))
}

async fn sma(
    State(state): State<Arc<AppState>>,
    Path((symbol, period, length)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    indicator(IndicatorKind::Sma, &state, &symbol, &period, &length).await
}

async fn ema(
    State(state): State<Arc<AppState>>,
    Path((symbol, period, length)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    indicator(IndicatorKind::Ema, &state, &symbol, &period, &length).await
}

async fn rsi(
    State(state): State<Arc<AppState>>,
    Path((symbol, period, length)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    indicator(IndicatorKind::Rsi, &state, &symbol, &period, &length).await
}

// =============================================================================
// Live SMA (provider data, nothing stored)
// =============================================================================

async fn live_sma(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_symbol(&state, &symbol)?;

    let period: Period = "1y".parse()?;
    let bars = state.source.download(state.ticker(), period).await?;
    let series = live_series(&bars)?;

    let latest = indicators::compute(IndicatorKind::Sma, &series, LIVE_SMA_LENGTH)?
        .latest()
        .ok_or_else(|| ApiError::Upstream("SMA calculation resulted in NaN".to_string()))?;

    Ok(Json(json!({
        "sma": latest,
        "length": LIVE_SMA_LENGTH,
        "points": series.len(),
    })))
}
