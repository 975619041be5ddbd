use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{asset::AssetCategory, interval::BarInterval};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Parameters for fetching one symbol's price history.
///
/// The window is inclusive on both ends. Providers may return bars outside it;
/// callers are expected to filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// Upper-cased ticker (e.g. `"FPT"`, `"VNINDEX"`, `"USDVND"`, `"BTC"`).
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: BarInterval,
    pub category: AssetCategory,
}

impl HistoryRequest {
    pub fn new(
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: BarInterval,
        category: AssetCategory,
    ) -> Result<Self, RequestError> {
        let symbol = normalize_symbol(symbol).ok_or(RequestError::EmptySymbol)?;
        if start > end {
            return Err(RequestError::InvertedRange { start, end });
        }
        Ok(Self {
            symbol,
            start,
            end,
            interval,
            category,
        })
    }

    /// Whether `date` falls inside the inclusive request window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Trims and upper-cases a ticker; `None` when nothing is left.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_uppercase())
}
