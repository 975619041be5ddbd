//! Series Normalizer: raw provider table to a dated close series.

use thiserror::Error;
use tracing::warn;
use vn_market_data::models::{bar::RawPriceTable, bar_time::parse_bar_date};

use crate::series::SymbolSeries;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed date for {symbol}: {value:?}")]
pub struct MalformedDateError {
    pub symbol: String,
    pub value: String,
}

/// Turns one provider table into a [`SymbolSeries`] of close prices.
///
/// Any unparseable date fails the whole symbol. Rows with a non-finite or
/// non-positive close are skipped, since they cannot produce a return.
pub fn normalize(table: &RawPriceTable) -> Result<SymbolSeries, MalformedDateError> {
    if table.is_empty() {
        return Ok(SymbolSeries::empty(&table.symbol));
    }

    let mut points = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let date = parse_bar_date(&row.time).map_err(|_| MalformedDateError {
            symbol: table.symbol.clone(),
            value: row.time.clone(),
        })?;
        if !row.close.is_finite() || row.close <= 0.0 {
            skipped += 1;
            continue;
        }
        points.push((date, row.close));
    }

    if skipped > 0 {
        warn!(symbol = %table.symbol, skipped, "skipped rows without a usable close");
    }
    Ok(SymbolSeries::from_points(&table.symbol, points))
}
