//! Single-symbol history lookups rendered for a text-based caller.
//!
//! Each operation is one routed fetch followed by formatting: a pretty JSON
//! array of bars on success, otherwise a readable sentence.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    models::{
        asset::AssetCategory,
        bar::{PriceBar, RawPriceTable},
        bar_time::{BarTimeError, parse_bar_date},
        interval::BarInterval,
        request_params::{HistoryRequest, RequestError},
    },
    providers::{FetchOutcome, PriceSource, ProviderError},
};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    MalformedDate(#[from] BarTimeError),

    #[error("Failed to serialize bars: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Fetches typed bars, sorted by date. `Ok(None)` means the window is empty.
pub async fn fetch_bars<S: PriceSource + ?Sized>(
    source: &S,
    request: &HistoryRequest,
) -> Result<Option<Vec<PriceBar>>, HistoryError> {
    match source.fetch_history(request).await? {
        FetchOutcome::NoData => Ok(None),
        FetchOutcome::Data(table) => to_price_bars(&table).map(Some),
    }
}

fn to_price_bars(table: &RawPriceTable) -> Result<Vec<PriceBar>, HistoryError> {
    let mut bars = table
        .rows
        .iter()
        .map(|row| {
            Ok(PriceBar {
                timestamp: parse_bar_date(&row.time)?,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume_units(),
            })
        })
        .collect::<Result<Vec<_>, HistoryError>>()?;
    bars.sort_by_key(|bar| bar.timestamp);
    Ok(bars)
}

/// Runs one lookup for `category` and renders the outcome as text.
pub async fn history_text<S: PriceSource + ?Sized>(
    source: &S,
    category: AssetCategory,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    interval: BarInterval,
) -> String {
    let kind = category.as_str();
    let request = match HistoryRequest::new(symbol, start, end, interval, category) {
        Ok(request) => request,
        Err(e) => return format!("Error fetching {kind} data: {e}"),
    };

    info!(symbol = %request.symbol, %kind, %interval, "history lookup");
    let rendered = fetch_bars(source, &request)
        .await
        .and_then(|bars| bars.map(|b| serde_json::to_string_pretty(&b)).transpose().map_err(Into::into));

    match rendered {
        Ok(Some(json)) => json,
        Ok(None) => format!(
            "No {kind} data found for {} between {start} and {end}",
            request.symbol
        ),
        Err(e) => {
            warn!(symbol = %request.symbol, error = %e, "history lookup failed");
            format!("Error fetching {kind} data: {e}")
        }
    }
}

pub async fn stock_history<S: PriceSource + ?Sized>(
    source: &S,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    interval: BarInterval,
) -> String {
    history_text(source, AssetCategory::Stock, symbol, start, end, interval).await
}

pub async fn forex_history<S: PriceSource + ?Sized>(
    source: &S,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    interval: BarInterval,
) -> String {
    history_text(source, AssetCategory::Forex, symbol, start, end, interval).await
}

pub async fn crypto_history<S: PriceSource + ?Sized>(
    source: &S,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    interval: BarInterval,
) -> String {
    history_text(source, AssetCategory::Crypto, symbol, start, end, interval).await
}

pub async fn index_history<S: PriceSource + ?Sized>(
    source: &S,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    interval: BarInterval,
) -> String {
    history_text(source, AssetCategory::Index, symbol, start, end, interval).await
}
