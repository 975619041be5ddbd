//! Bar representations at the two ends of a provider call.
//!
//! Providers hand back a [`RawPriceTable`]: rows exactly as the vendor sent
//! them, with the time field still a string. Downstream code turns those rows
//! into typed [`PriceBar`]s once the date has been parsed.

use chrono::NaiveDate;
use serde::Serialize;

/// A single trading-period observation for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    /// Trading date of the bar.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval.
    pub volume: u64,
}

/// One row of a provider payload before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    /// Date-like field as sent by the vendor (ISO date, ISO date-time or epoch seconds).
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// The untyped table a provider returns for one symbol.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPriceTable {
    pub symbol: String,
    pub rows: Vec<RawBar>,
}

impl RawPriceTable {
    pub fn new(symbol: impl Into<String>, rows: Vec<RawBar>) -> Self {
        Self {
            symbol: symbol.into(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RawBar {
    /// Volume clamped into the non-negative integer domain of [`PriceBar`].
    pub fn volume_units(&self) -> u64 {
        if self.volume.is_finite() && self.volume > 0.0 {
            self.volume.round() as u64
        } else {
            0
        }
    }
}
