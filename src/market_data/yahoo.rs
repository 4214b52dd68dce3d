// =============================================================================
// Yahoo Finance chart client: daily OHLCV download
// =============================================================================
//
// Uses the public v8 chart endpoint:
//   GET {base}/v8/finance/chart/{symbol}?range={period}&interval=1d
//
// Period tokens are passed through unchanged as the `range` parameter; the
// vocabulary is identical.  One request per call, no retry.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{FetchError, MarketDataSource};
use crate::period::Period;
use crate::types::HistoricalBar;

/// Yahoo rejects requests without a browser-like user agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

// -----------------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    /// Exchange offset from UTC in seconds; bar timestamps are session opens.
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Deserialize)]
struct QuoteColumns {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// HTTP client for the Yahoo Finance chart API.
#[derive(Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    /// Create a client against `base_url` (no trailing slash required).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "YahooClient initialised");
        Ok(Self { base_url, client })
    }

    fn chart_url(&self, symbol: &str, period: Period) -> String {
        format!(
            "{}/v8/finance/chart/{}?range={}&interval=1d&includePrePost=false",
            self.base_url, symbol, period
        )
    }

    /// GET the chart payload for `symbol` over `period`.
    async fn get_chart(&self, symbol: &str, period: Period) -> Result<ChartResponse> {
        let url = self.chart_url(symbol, period);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /v8/finance/chart request failed")?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("failed to read chart response body")?;

        // Yahoo reports unknown symbols as 404 with a well-formed error body,
        // so parse before checking the status.
        match serde_json::from_str::<ChartResponse>(&body) {
            Ok(chart) => Ok(chart),
            Err(_) if !status.is_success() => {
                anyhow::bail!("Yahoo GET /v8/finance/chart returned {status}: {body}")
            }
            Err(e) => Err(e).context("failed to parse chart response"),
        }
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    #[instrument(skip(self), name = "yahoo::download")]
    async fn download(&self, symbol: &str, period: Period) -> Result<Vec<HistoricalBar>, FetchError> {
        let chart = self.get_chart(symbol, period).await?;
        let bars = parse_chart(symbol, chart)?;
        debug!(symbol, %period, count = bars.len(), "daily bars downloaded");
        Ok(bars)
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Normalisation
// -----------------------------------------------------------------------------

/// Turn a chart payload into cleaned, date-ascending bars.
///
/// Rows without a close are dropped. Missing open/high/low fall back to the
/// close; missing volume becomes 0. When the provider emits two rows for the
/// same session date (intraday snapshot of the current day) the later wins.
fn parse_chart(symbol: &str, chart: ChartResponse) -> Result<Vec<HistoricalBar>, FetchError> {
    if let Some(err) = chart.chart.error {
        if err.code == "Not Found" {
            return Err(FetchError::Empty);
        }
        return Err(FetchError::Provider(format!("{}: {}", err.code, err.description)));
    }

    let Some(data) = chart.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(FetchError::Empty);
    };

    let timestamps = match data.timestamp {
        Some(ts) if !ts.is_empty() => ts,
        _ => return Err(FetchError::Empty),
    };

    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or(FetchError::MissingColumn("close"))?;
    let closes = quote.close.ok_or(FetchError::MissingColumn("close"))?;

    let at = |col: &Option<Vec<Option<f64>>>, i: usize| -> Option<f64> {
        col.as_ref()
            .and_then(|v| v.get(i).copied().flatten())
            .filter(|x| x.is_finite())
    };

    let ticker = symbol.to_uppercase();
    let mut bars: Vec<HistoricalBar> = Vec::with_capacity(timestamps.len());
    let mut dropped = 0usize;

    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(close) = closes.get(i).copied().flatten().filter(|c| c.is_finite()) else {
            dropped += 1;
            continue;
        };
        let Some(date) = session_date(ts, offset) else {
            warn!(symbol, ts, "skipping bar with out-of-range timestamp");
            dropped += 1;
            continue;
        };

        let bar = HistoricalBar {
            date,
            open: at(&quote.open, i).unwrap_or(close),
            high: at(&quote.high, i).unwrap_or(close),
            low: at(&quote.low, i).unwrap_or(close),
            close,
            volume: at(&quote.volume, i).map(|v| v as i64).unwrap_or(0),
            ticker: ticker.clone(),
        };

        bars.push(bar);
    }

    if dropped > 0 {
        debug!(symbol, dropped, "dropped rows without a usable close");
    }
    if bars.is_empty() {
        return Err(FetchError::Empty);
    }

    Ok(latest_per_session(bars))
}

/// Sort by date and keep the last row the provider sent for each date.
fn latest_per_session(mut bars: Vec<HistoricalBar>) -> Vec<HistoricalBar> {
    // Stable sort: rows sharing a date stay in provider order.
    bars.sort_by_key(|b| b.date);

    let mut merged: Vec<HistoricalBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match merged.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => merged.push(bar),
        }
    }
    merged
}

/// Exchange-local calendar date for a UNIX timestamp.
fn session_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    let local = ts.checked_add(gmtoffset)?;
    DateTime::from_timestamp(local, 0).map(|dt| dt.date_naive())
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<HistoricalBar>, FetchError> {
        let chart: ChartResponse = serde_json::from_str(json).unwrap();
        parse_chart("acme", chart)
    }

    // 2024-01-02 and 2024-01-03 14:30 UTC (09:30 New York).
    const TS1: i64 = 1_704_205_800;
    const TS2: i64 = 1_704_292_200;
    const TS3: i64 = 1_704_378_600;

    #[test]
    fn parses_rows_and_normalises_ticker() {
        let json = format!(
            r#"{{"chart":{{"result":[{{"meta":{{"gmtoffset":-18000}},
                "timestamp":[{TS1},{TS2}],
                "indicators":{{"quote":[{{
                    "open":[10.0,11.0],"high":[12.0,13.0],"low":[9.0,10.5],
                    "close":[11.5,12.5],"volume":[1000,2000]}}]}}}}],"error":null}}}}"#
        );
        let bars = parse(&json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(bars[0].ticker, "ACME");
        assert!((bars[1].close - 12.5).abs() < 1e-12);
        assert_eq!(bars[1].volume, 2000);
    }

    #[test]
    fn drops_rows_without_close() {
        let json = format!(
            r#"{{"chart":{{"result":[{{"timestamp":[{TS1},{TS2},{TS3}],
                "indicators":{{"quote":[{{
                    "open":[1.0,null,3.0],"high":[1.0,null,3.0],"low":[1.0,null,3.0],
                    "close":[1.0,null,3.0],"volume":[1,null,3]}}]}}}}],"error":null}}}}"#
        );
        let bars = parse(&json).unwrap();
        assert_eq!(bars.len(), 2);
        assert!((bars[1].close - 3.0).abs() < 1e-12);
    }

    #[test]
    fn missing_open_falls_back_to_close() {
        let json = format!(
            r#"{{"chart":{{"result":[{{"timestamp":[{TS1}],
                "indicators":{{"quote":[{{
                    "open":[null],"high":[null],"low":[null],
                    "close":[5.0],"volume":[null]}}]}}}}],"error":null}}}}"#
        );
        let bars = parse(&json).unwrap();
        assert!((bars[0].open - 5.0).abs() < 1e-12);
        assert!((bars[0].high - 5.0).abs() < 1e-12);
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn all_null_closes_is_empty() {
        let json = format!(
            r#"{{"chart":{{"result":[{{"timestamp":[{TS1}],
                "indicators":{{"quote":[{{"open":[1.0],"high":[1.0],"low":[1.0],
                "close":[null],"volume":[1]}}]}}}}],"error":null}}}}"#
        );
        assert!(matches!(parse(&json), Err(FetchError::Empty)));
    }

    #[test]
    fn no_timestamps_is_empty() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(matches!(parse(json), Err(FetchError::Empty)));
    }

    #[test]
    fn missing_close_column_is_schema_failure() {
        let json = format!(
            r#"{{"chart":{{"result":[{{"timestamp":[{TS1}],
                "indicators":{{"quote":[{{"open":[1.0],"high":[1.0],"low":[1.0],
                "volume":[1]}}]}}}}],"error":null}}}}"#
        );
        assert!(matches!(parse(&json), Err(FetchError::MissingColumn("close"))));
    }

    #[test]
    fn provider_error_is_surfaced() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        match parse(json) {
            Err(FetchError::Provider(msg)) => assert!(msg.contains("Invalid input")),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_symbol_is_empty() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert!(matches!(parse(json), Err(FetchError::Empty)));
    }

    #[test]
    fn duplicate_session_keeps_latest_row() {
        let json = format!(
            r#"{{"chart":{{"result":[{{"timestamp":[{TS1},{}],
                "indicators":{{"quote":[{{"open":[1.0,1.0],"high":[1.0,1.0],"low":[1.0,1.0],
                "close":[1.0,2.0],"volume":[1,2]}}]}}}}],"error":null}}}}"#,
            TS1 + 3600
        );
        let bars = parse(&json).unwrap();
        assert_eq!(bars.len(), 1);
        assert!((bars[0].close - 2.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_order_duplicate_session_keeps_later_row() {
        // Provider order: day 2, day 1 (first snapshot), day 1 (second snapshot).
        let json = format!(
            r#"{{"chart":{{"result":[{{"timestamp":[{TS2},{TS1},{}],
                "indicators":{{"quote":[{{"open":[1.0,1.0,1.0],"high":[1.0,1.0,1.0],
                "low":[1.0,1.0,1.0],"close":[7.0,1.0,2.0],"volume":[1,1,1]}}]}}}}],
                "error":null}}}}"#,
            TS1 + 3600
        );
        let bars = parse(&json).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!((bars[0].close - 2.0).abs() < 1e-12);
        assert!((bars[1].close - 7.0).abs() < 1e-12);
    }

    #[test]
    fn extreme_timestamp_is_skipped_not_overflowed() {
        assert_eq!(session_date(i64::MAX, 3600), None);
        assert_eq!(session_date(i64::MIN, -3600), None);
        assert_eq!(
            session_date(TS1, -18_000),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );

        let json = format!(
            r#"{{"chart":{{"result":[{{"meta":{{"gmtoffset":3600}},
                "timestamp":[{TS1},{}],
                "indicators":{{"quote":[{{"close":[1.0,2.0]}}]}}}}],"error":null}}}}"#,
            i64::MAX
        );
        let bars = parse(&json).unwrap();
        assert_eq!(bars.len(), 1);
        assert!((bars[0].close - 1.0).abs() < 1e-12);
    }

    #[test]
    fn chart_url_passes_period_as_range() {
        let client = YahooClient::new("https://example.test/").unwrap();
        let url = client.chart_url("META", "6mo".parse().unwrap());
        assert_eq!(
            url,
            "https://example.test/v8/finance/chart/META?range=6mo&interval=1d&includePrePost=false"
        );
    }
}
