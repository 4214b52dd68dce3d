// =============================================================================
// Historical Store: `historical_data` table over a SQLite connection pool
// =============================================================================
//
// One row per (date, ticker).  Writes are insert-or-ignore so the first bar
// written for a session date is the one that stays.  Reads never surface a
// storage error to the caller: failures are logged and reported as "absent".
//
// A pooled connection is checked out per call and returned when the guard is
// dropped, on success and error paths alike.
// =============================================================================

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, error, info};

use crate::period::Period;
use crate::types::HistoricalBar;

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS historical_data (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    date    TEXT    NOT NULL,
    open    REAL,
    high    REAL,
    low     REAL,
    close   REAL    NOT NULL,
    volume  INTEGER,
    ticker  TEXT    NOT NULL,
    UNIQUE (date, ticker)
);
";

const INSERT_BAR: &str = "
INSERT INTO historical_data (date, open, high, low, close, volume, ticker)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT (date, ticker) DO NOTHING
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Translate a `DATABASE_URL` into a SQLite file path.
///
/// Accepts `sqlite://path`, `sqlite:path`, or a bare path.
pub fn database_path(url: &str) -> PathBuf {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    PathBuf::from(path)
}

/// Handle to the historical price table.
#[derive(Clone)]
pub struct HistoricalStore {
    pool: DbPool,
}

impl HistoricalStore {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: &Path, max_size: u32) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder().max_size(max_size).build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        info!(path = %path.display(), "historical store ready");
        Ok(store)
    }

    /// Create `historical_data` if it does not already exist.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert `bars`, skipping any whose (date, ticker) already exists.
    ///
    /// The whole batch runs in one transaction: on any error nothing is
    /// written. Returns how many rows were actually inserted.
    pub fn upsert(&self, bars: &[HistoricalBar]) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(INSERT_BAR)?;
            for bar in bars {
                inserted += stmt.execute(params![
                    bar.date,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.ticker,
                ])?;
            }
        }

        // An early `?` return drops `tx`, which rolls the batch back.
        tx.commit()?;

        info!(
            received = bars.len(),
            inserted,
            skipped = bars.len() - inserted,
            "historical bars stored"
        );
        Ok(inserted)
    }

    /// Bars for `ticker` within `period` (relative to today, UTC), ascending
    /// by date.
    ///
    /// `None` when the token is invalid, nothing matches, or the query fails.
    pub fn query(&self, period: &str, ticker: &str) -> Option<Vec<HistoricalBar>> {
        let period: Period = match period.parse() {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "historical query with unknown period");
                return None;
            }
        };
        // UTC calendar date. Bar dates are exchange-local, so between UTC
        // midnight and the exchange's midnight the window sits one day ahead
        // and a trailing window holds one session fewer.
        let lower = period.lower_bound(Utc::now().date_naive());
        self.query_window(ticker, lower)
    }

    /// Bars for `ticker` on or after `lower` (all bars when `None`).
    pub fn query_window(&self, ticker: &str, lower: Option<NaiveDate>) -> Option<Vec<HistoricalBar>> {
        match self.fetch_bars(ticker, lower) {
            Ok(bars) if bars.is_empty() => {
                debug!(ticker, ?lower, "no stored bars in window");
                None
            }
            Ok(bars) => Some(bars),
            Err(e) => {
                error!(ticker, error = %e, "failed to read historical bars");
                None
            }
        }
    }

    fn fetch_bars(&self, ticker: &str, lower: Option<NaiveDate>) -> Result<Vec<HistoricalBar>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare_cached(
            "SELECT date, open, high, low, close, volume, ticker
             FROM historical_data
             WHERE ticker = ?1 AND (?2 IS NULL OR date >= ?2)
             ORDER BY date ASC",
        )?;

        let rows = stmt
            .query_map(params![ticker, lower], |row| {
                let close: f64 = row.get(4)?;
                Ok(HistoricalBar {
                    date: row.get(0)?,
                    open: row.get::<_, Option<f64>>(1)?.unwrap_or(close),
                    high: row.get::<_, Option<f64>>(2)?.unwrap_or(close),
                    low: row.get::<_, Option<f64>>(3)?.unwrap_or(close),
                    close,
                    volume: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                    ticker: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

impl std::fmt::Debug for HistoricalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoricalStore")
            .field("pool_size", &self.pool.max_size())
            .finish()
    }
}
