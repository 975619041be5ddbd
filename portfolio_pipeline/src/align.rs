//! Multi-Series Aligner & Cleaner.
//!
//! Merges per-symbol close series into one [`PriceMatrix`]. The row key set
//! is the union of all available dates; every row missing a value for any
//! kept symbol is dropped. No value is ever filled in.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use nalgebra::DMatrix;
use tracing::{info, warn};

use crate::{
    errors::PipelineError,
    fetch::{DropReason, DroppedSymbol, SeriesOutcome},
    series::{DateWindow, PriceMatrix, SymbolSeries},
};

/// Minimum shape of a usable matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentPolicy {
    pub min_symbols: usize,
    pub min_observations: usize,
}

impl Default for AlignmentPolicy {
    fn default() -> Self {
        Self {
            min_symbols: 2,
            min_observations: 2,
        }
    }
}

impl AlignmentPolicy {
    /// A single asset still has a well-defined expected return.
    pub fn single_asset() -> Self {
        Self {
            min_symbols: 1,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPrices {
    pub matrix: PriceMatrix,
    /// Symbols left out, in request order.
    pub dropped: Vec<DroppedSymbol>,
}

/// Aligns fetched series on their common dates inside `window`.
pub fn align(
    outcomes: Vec<(String, SeriesOutcome)>,
    window: DateWindow,
    policy: AlignmentPolicy,
) -> Result<AlignedPrices, PipelineError> {
    if outcomes.is_empty() {
        return Err(PipelineError::InvalidRequest("no symbols requested".into()));
    }
    let attempted: Vec<String> = outcomes.iter().map(|(s, _)| s.clone()).collect();

    let mut available: Vec<SymbolSeries> = Vec::new();
    let mut dropped: Vec<DroppedSymbol> = Vec::new();
    for (symbol, outcome) in outcomes {
        match outcome {
            SeriesOutcome::Available(series) => {
                let series = series.restrict(window);
                if series.is_empty() {
                    dropped.push(DroppedSymbol {
                        symbol,
                        reason: DropReason::NoData,
                    });
                } else {
                    available.push(series);
                }
            }
            SeriesOutcome::Unavailable(reason) => dropped.push(DroppedSymbol { symbol, reason }),
        }
    }

    if available.is_empty() {
        warn!(symbols = ?attempted, "no symbol returned data");
        let dropped = in_request_order(dropped, &attempted);
        return Err(PipelineError::NoData {
            symbols: attempted,
            dropped,
        });
    }

    // A symbol that cannot share enough dates with any other one would wipe
    // out every row; set it aside instead.
    if available.len() > 1 {
        let misaligned = fully_misaligned(&available, policy.min_observations);
        if !misaligned.is_empty() && misaligned.len() < available.len() {
            let mut kept = Vec::with_capacity(available.len() - misaligned.len());
            for (i, series) in available.into_iter().enumerate() {
                if misaligned.contains(&i) {
                    warn!(symbol = %series.symbol(), "dropping misaligned series");
                    dropped.push(DroppedSymbol {
                        symbol: series.symbol().to_string(),
                        reason: DropReason::Misaligned,
                    });
                } else {
                    kept.push(series);
                }
            }
            available = kept;
        }
    }
    let dropped = in_request_order(dropped, &attempted);

    let union: BTreeSet<NaiveDate> = available.iter().flat_map(|s| s.dates()).collect();
    let mut dates = Vec::with_capacity(union.len());
    let mut cells: Vec<f64> = Vec::with_capacity(union.len() * available.len());
    for date in union {
        let row: Option<Vec<f64>> = available.iter().map(|s| s.close_on(date)).collect();
        if let Some(row) = row {
            dates.push(date);
            cells.extend(row);
        }
    }

    let symbols: Vec<String> = available.iter().map(|s| s.symbol().to_string()).collect();
    if symbols.len() < policy.min_symbols || dates.len() < policy.min_observations {
        warn!(
            survived = ?symbols,
            observations = dates.len(),
            dropped = dropped.len(),
            "insufficient data after alignment"
        );
        return Err(PipelineError::InsufficientData {
            survived: symbols,
            observations: dates.len(),
            dropped,
        });
    }

    info!(
        symbols = symbols.len(),
        observations = dates.len(),
        dropped = dropped.len(),
        "aligned price matrix"
    );
    let prices = DMatrix::from_row_slice(dates.len(), symbols.len(), &cells);
    Ok(AlignedPrices {
        matrix: PriceMatrix::new(symbols, dates, prices),
        dropped,
    })
}

/// Indices of series sharing fewer than `min_common` dates with every other series.
fn fully_misaligned(series: &[SymbolSeries], min_common: usize) -> Vec<usize> {
    let date_sets: Vec<BTreeSet<NaiveDate>> = series.iter().map(|s| s.dates().collect()).collect();
    (0..date_sets.len())
        .filter(|&i| {
            (0..date_sets.len())
                .filter(|&j| j != i)
                .all(|j| date_sets[i].intersection(&date_sets[j]).count() < min_common)
        })
        .collect()
}

fn in_request_order(mut dropped: Vec<DroppedSymbol>, attempted: &[String]) -> Vec<DroppedSymbol> {
    dropped.sort_by_key(|d| attempted.iter().position(|s| *s == d.symbol));
    dropped
}
