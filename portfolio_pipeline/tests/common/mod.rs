#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use portfolio_pipeline::config::AppConfig;
use vn_market_data::{
    models::{
        bar::{RawBar, RawPriceTable},
        request_params::HistoryRequest,
    },
    providers::{ApiSnafu, FetchOutcome, PriceSource, ProviderError},
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekdays from `start`, `count` of them.
pub fn trading_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(count);
    let mut day = start;
    while out.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day += Duration::days(1);
    }
    out
}

/// A smooth, strictly positive price path with a trend and a wobble.
pub fn synthetic_closes(base: f64, drift: f64, amplitude: f64, phase: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            base * (drift * t + amplitude * (0.37 * t + phase).sin()).exp()
        })
        .collect()
}

pub fn bars(dates: &[NaiveDate], closes: &[f64]) -> Vec<RawBar> {
    dates
        .iter()
        .zip(closes)
        .map(|(d, &c)| RawBar {
            time: d.format("%Y-%m-%d").to_string(),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1_000.0,
        })
        .collect()
}

/// Serves canned rows by symbol; unknown symbols have no data.
#[derive(Default)]
pub struct MemorySource {
    rows: HashMap<String, Vec<RawBar>>,
    failing: HashSet<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, symbol: &str, rows: Vec<RawBar>) -> Self {
        self.rows.insert(symbol.to_string(), rows);
        self
    }

    pub fn with_series(self, symbol: &str, dates: &[NaiveDate], closes: &[f64]) -> Self {
        self.with_rows(symbol, bars(dates, closes))
    }

    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl PriceSource for MemorySource {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<FetchOutcome, ProviderError> {
        if self.failing.contains(&request.symbol) {
            return ApiSnafu {
                status: 500u16,
                message: "internal error",
            }
            .fail();
        }
        let Some(rows) = self.rows.get(&request.symbol) else {
            return Ok(FetchOutcome::NoData);
        };
        let rows: Vec<RawBar> = rows
            .iter()
            .filter(|row| {
                NaiveDate::parse_from_str(&row.time, "%Y-%m-%d").map_or(true, |d| request.contains(d))
            })
            .cloned()
            .collect();
        if rows.is_empty() {
            Ok(FetchOutcome::NoData)
        } else {
            Ok(FetchOutcome::Data(RawPriceTable::new(request.symbol.clone(), rows)))
        }
    }
}

/// Three liquid names over the first half of 2024 plus the window to query.
pub fn market() -> (MemorySource, NaiveDate, NaiveDate) {
    let days = trading_days(date(2024, 1, 2), 120);
    let source = MemorySource::new()
        .with_series("AAA", &days, &synthetic_closes(50.0, 0.0012, 0.02, 0.0, days.len()))
        .with_series("BBB", &days, &synthetic_closes(80.0, 0.0006, 0.01, 1.3, days.len()))
        .with_series("DDD", &days, &synthetic_closes(20.0, 0.0009, 0.03, 2.1, days.len()));
    (source, days[0], days[days.len() - 1])
}

pub fn config() -> AppConfig {
    AppConfig::default()
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
