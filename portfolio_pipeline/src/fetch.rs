//! Concurrent per-symbol fetch with individual timeouts.
//!
//! Every symbol gets its own request; the join waits for all of them and
//! hands back one [`SeriesOutcome`] per symbol in the caller's order. A
//! symbol that times out, fails upstream or has no data is marked
//! unavailable without affecting the others. Dropping the future returned by
//! [`fetch_all`] abandons every fetch still in flight.

use std::{fmt, time::Duration};

use futures::future::join_all;
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info, warn};
use vn_market_data::{
    models::{
        asset::AssetCategory,
        interval::BarInterval,
        request_params::{HistoryRequest, normalize_symbol},
    },
    providers::{FetchOutcome, PriceSource},
};

use crate::{
    normalize::normalize,
    series::{DateWindow, SymbolSeries},
};

/// Why a symbol did not make it into the price matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DropReason {
    /// The source answered but had nothing inside the window.
    NoData,
    /// Transport failure, vendor error or undecodable payload.
    FetchFailed(String),
    TimedOut,
    MalformedDate(String),
    /// Too few dates in common with every other available symbol.
    Misaligned,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoData => f.write_str("no data in range"),
            DropReason::FetchFailed(msg) => write!(f, "fetch failed: {msg}"),
            DropReason::TimedOut => f.write_str("fetch timed out"),
            DropReason::MalformedDate(msg) => write!(f, "malformed date: {msg}"),
            DropReason::Misaligned => f.write_str("no overlapping dates with other symbols"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedSymbol {
    pub symbol: String,
    #[serde(flatten)]
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesOutcome {
    Available(SymbolSeries),
    Unavailable(DropReason),
}

/// How each per-symbol request is issued.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub interval: BarInterval,
    pub category: AssetCategory,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            interval: BarInterval::Daily,
            category: AssetCategory::Stock,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Trims and upper-cases tickers, dropping blanks and repeats (first one wins).
pub fn unique_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
    symbols
        .iter()
        .filter_map(|s| normalize_symbol(s.as_ref()))
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}

/// Fetches and normalizes every symbol concurrently.
///
/// `symbols` is expected to be de-duplicated already (see [`unique_symbols`]).
pub async fn fetch_all<S: PriceSource + ?Sized>(
    source: &S,
    symbols: &[String],
    window: DateWindow,
    options: FetchOptions,
) -> Vec<(String, SeriesOutcome)> {
    info!(symbols = symbols.len(), start = %window.start, end = %window.end, "fetching price histories");
    let fetches = symbols.iter().map(|symbol| async move {
        let outcome = fetch_one(source, symbol, window, options).await;
        (symbol.clone(), outcome)
    });
    join_all(fetches).await
}

async fn fetch_one<S: PriceSource + ?Sized>(
    source: &S,
    symbol: &str,
    window: DateWindow,
    options: FetchOptions,
) -> SeriesOutcome {
    let request = match HistoryRequest::new(symbol, window.start, window.end, options.interval, options.category) {
        Ok(request) => request,
        Err(e) => return SeriesOutcome::Unavailable(DropReason::FetchFailed(e.to_string())),
    };

    let table = match tokio::time::timeout(options.timeout, source.fetch_history(&request)).await {
        Err(_) => {
            warn!(%symbol, timeout = ?options.timeout, "fetch timed out");
            return SeriesOutcome::Unavailable(DropReason::TimedOut);
        }
        Ok(Err(e)) => {
            warn!(%symbol, error = %e, "fetch failed");
            return SeriesOutcome::Unavailable(DropReason::FetchFailed(e.to_string()));
        }
        Ok(Ok(FetchOutcome::NoData)) => {
            debug!(%symbol, "no data in range");
            return SeriesOutcome::Unavailable(DropReason::NoData);
        }
        Ok(Ok(FetchOutcome::Data(table))) => table,
    };

    match normalize(&table) {
        Ok(series) if series.is_empty() => SeriesOutcome::Unavailable(DropReason::NoData),
        Ok(series) => {
            debug!(%symbol, rows = series.len(), "normalized");
            SeriesOutcome::Available(series)
        }
        Err(e) => {
            warn!(%symbol, error = %e, "dropping symbol with malformed dates");
            SeriesOutcome::Unavailable(DropReason::MalformedDate(e.value))
        }
    }
}
