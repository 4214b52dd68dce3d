// =============================================================================
// Shared types used across the Sloan Analyst service
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar for a ticker, as stored in `historical_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub ticker: String,
}

/// Date-ascending close prices extracted from stored bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.closes.len()
    }
}

impl From<&[HistoricalBar]> for PriceSeries {
    fn from(bars: &[HistoricalBar]) -> Self {
        Self {
            dates: bars.iter().map(|b| b.date).collect(),
            closes: bars.iter().map(|b| b.close).collect(),
        }
    }
}

/// Which indicator to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
}

impl IndicatorKind {
    /// JSON key used in indicator responses.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Rsi => "rsi",
        }
    }
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sma => write!(f, "SMA"),
            Self::Ema => write!(f, "EMA"),
            Self::Rsi => write!(f, "RSI"),
        }
    }
}
