// =============================================================================
// Period Resolver: token → look-back window
// =============================================================================
//
// The period vocabulary is shared by the provider (`range=` parameter) and the
// historical store (date lower bound).  Resolution is a table lookup; tokens
// outside the table are rejected rather than defaulted.
// =============================================================================

use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

/// Shape of the look-back window for a period token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Days(u64),
    Months(u32),
    Years(u32),
    /// Since January 1st of the current calendar year.
    YearToDate,
    /// No lower bound.
    Unbounded,
}

/// Every accepted token, in ascending window length.
const PERIOD_TABLE: &[(&str, Window)] = &[
    ("1d", Window::Days(1)),
    ("5d", Window::Days(5)),
    ("1mo", Window::Months(1)),
    ("3mo", Window::Months(3)),
    ("6mo", Window::Months(6)),
    ("1y", Window::Years(1)),
    ("2y", Window::Years(2)),
    ("5y", Window::Years(5)),
    ("10y", Window::Years(10)),
    ("ytd", Window::YearToDate),
    ("max", Window::Unbounded),
];

/// A validated period token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "&'static str")]
pub struct Period {
    token: &'static str,
    window: Window,
}

/// Returned for any token not present in the period table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period '{0}'")]
pub struct UnknownPeriod(pub String);

impl Period {
    /// All accepted periods in table order.
    pub fn all() -> impl Iterator<Item = Period> {
        PERIOD_TABLE
            .iter()
            .map(|&(token, window)| Period { token, window })
    }

    pub fn as_str(&self) -> &'static str {
        self.token
    }

    /// Inclusive lower date bound relative to `today`, or `None` for `max`.
    ///
    /// A trailing window of `n` units starts the day after `today - n`, so
    /// `1d` covers today only and `5d` covers five dates. Month and year
    /// arithmetic clamps to the last valid day of the target month before
    /// that step (31 March - 1mo = 29 February, bound 1 March). `ytd` starts
    /// on January 1st itself.
    pub fn lower_bound(&self, today: NaiveDate) -> Option<NaiveDate> {
        let back = match self.window {
            Window::Days(n) => today.checked_sub_days(Days::new(n)),
            Window::Months(n) => today.checked_sub_months(Months::new(n)),
            Window::Years(n) => today.checked_sub_months(Months::new(n * 12)),
            Window::YearToDate => return NaiveDate::from_ymd_opt(today.year(), 1, 1),
            Window::Unbounded => return None,
        };
        back.and_then(|d| d.succ_opt())
    }
}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PERIOD_TABLE
            .iter()
            .find(|(token, _)| *token == s)
            .map(|&(token, window)| Period { token, window })
            .ok_or_else(|| UnknownPeriod(s.to_string()))
    }
}

impl From<Period> for &'static str {
    fn from(p: Period) -> Self {
        p.token
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token)
    }
}
