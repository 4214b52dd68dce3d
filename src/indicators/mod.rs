// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math plus `compute`, which aligns a raw
// indicator series back onto the dates of its input.  Positions inside the
// warm-up window are `None` and serialise as JSON `null`.

pub mod ema;
pub mod rsi;
pub mod sma;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{IndicatorKind, PriceSeries};

/// Date-keyed indicator output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IndicatorSeries {
    pub values: BTreeMap<NaiveDate, Option<f64>>,
}

impl IndicatorSeries {
    /// Most recent defined value.
    pub fn latest(&self) -> Option<f64> {
        self.values.values().rev().find_map(|v| *v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("indicator length must be at least 1")]
    InvalidLength,
    #[error("not enough data for the given timeperiod: {available} points, {required} required")]
    InsufficientData { available: usize, required: usize },
}

/// Number of leading positions without a value.
pub fn warm_up(kind: IndicatorKind, length: usize) -> usize {
    match kind {
        IndicatorKind::Sma | IndicatorKind::Ema => length.saturating_sub(1),
        // RSI needs `length` price changes, i.e. `length + 1` closes.
        IndicatorKind::Rsi => length,
    }
}

/// Raw indicator values starting at index [`warm_up`].
pub fn calculate(kind: IndicatorKind, closes: &[f64], length: usize) -> Vec<f64> {
    match kind {
        IndicatorKind::Sma => sma::calculate_sma(closes, length),
        IndicatorKind::Ema => ema::calculate_ema(closes, length),
        IndicatorKind::Rsi => rsi::calculate_rsi(closes, length),
    }
}

/// Compute `kind` over `series` with window `length`, keyed by the input
/// dates.
///
/// Fails with [`IndicatorError::InsufficientData`] when the series is shorter
/// than `length`; a partial result is never returned.
pub fn compute(
    kind: IndicatorKind,
    series: &PriceSeries,
    length: usize,
) -> Result<IndicatorSeries, IndicatorError> {
    if length == 0 {
        return Err(IndicatorError::InvalidLength);
    }
    if series.len() < length {
        return Err(IndicatorError::InsufficientData {
            available: series.len(),
            required: length,
        });
    }

    let offset = warm_up(kind, length);
    let raw = calculate(kind, &series.closes, length);

    let values = series
        .dates
        .iter()
        .enumerate()
        .map(|(i, &date)| {
            let v = i.checked_sub(offset).and_then(|k| raw.get(k).copied());
            (date, v)
        })
        .collect();

    Ok(IndicatorSeries { values })
}
