// =============================================================================
// Market Data Source: provider abstraction and cleaning policy
// =============================================================================

pub mod yahoo;

use async_trait::async_trait;

use crate::period::Period;
use crate::types::{HistoricalBar, PriceSeries};

pub use yahoo::YahooClient;

/// Minimum cleaned closes required before a live 20-period indicator runs.
pub const MIN_LIVE_POINTS: usize = 20;

/// Why a download produced no usable bars.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network, HTTP, or provider-declared failure.
    #[error("provider error: {0}")]
    Provider(String),
    /// The provider answered but had no rows for the window.
    #[error("no data returned by provider")]
    Empty,
    /// The payload lacks a required price column.
    #[error("provider response is missing the '{0}' column")]
    MissingColumn(&'static str),
}

impl From<anyhow::Error> for FetchError {
    fn from(e: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line.
        Self::Provider(format!("{e:#}"))
    }
}

/// Read-only source of daily OHLCV history.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Download daily bars for `symbol` over `period`.
    ///
    /// Implementations return bars in ascending date order with rows lacking
    /// a close already removed. An empty result is reported as
    /// [`FetchError::Empty`], never as `Ok(vec![])`.
    async fn download(&self, symbol: &str, period: Period) -> Result<Vec<HistoricalBar>, FetchError>;
}

/// Fewer than [`MIN_LIVE_POINTS`] usable closes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not enough data points: {available} available, minimum {required} required")]
pub struct NotEnoughPoints {
    pub available: usize,
    pub required: usize,
}

/// Build the close series used for live indicators, skipping non-finite
/// closes.
pub fn live_series(bars: &[HistoricalBar]) -> Result<PriceSeries, NotEnoughPoints> {
    let (dates, closes): (Vec<_>, Vec<_>) = bars
        .iter()
        .filter(|b| b.close.is_finite())
        .map(|b| (b.date, b.close))
        .unzip();

    if closes.len() < MIN_LIVE_POINTS {
        return Err(NotEnoughPoints {
            available: closes.len(),
            required: MIN_LIVE_POINTS,
        });
    }
    Ok(PriceSeries { dates, closes })
}
