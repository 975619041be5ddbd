//! Expected-return and covariance estimators.
//!
//! All estimators work on simple period returns of a [`PriceMatrix`] and
//! annualize with [`EstimatorSettings::periods_per_year`]. The method enums parse
//! from the names callers pass over the wire (`"mean_historical_return"`,
//! `"ledoit_wolf"`, ...).

pub mod returns;
pub mod risk;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::PriceMatrix;

pub use returns::ReturnsMethod;
pub use risk::RiskMethod;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    #[error("{method} needs at least {needed} return observations, got {got}")]
    TooFewObservations {
        method: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("{method} produced a non-finite estimate")]
    NonFinite { method: &'static str },

    #[error("Unknown {kind} method: {name}")]
    UnknownMethod { kind: &'static str, name: String },
}

/// Tuning shared by every estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorSettings {
    /// Periods per year used to annualize. Unset means daily bars.
    pub frequency: Option<u32>,
    /// Span of the exponential weighting for `ema_historical_return`.
    pub ema_span: usize,
    /// Span of the exponential weighting for `exp_cov`.
    pub cov_span: usize,
    /// Per-period return below which `semicovariance` counts a downside move.
    /// Unset means 2% a year at the annualization frequency.
    pub semicov_benchmark: Option<f64>,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            frequency: None,
            ema_span: 500,
            cov_span: 180,
            semicov_benchmark: None,
        }
    }
}

impl EstimatorSettings {
    pub const DAILY_PERIODS: u32 = 252;

    pub fn periods_per_year(&self) -> f64 {
        self.frequency.unwrap_or(Self::DAILY_PERIODS) as f64
    }

    pub fn semicov_benchmark(&self) -> f64 {
        self.semicov_benchmark
            .unwrap_or_else(|| 1.02_f64.powf(1.0 / self.periods_per_year()) - 1.0)
    }
}

/// Produces one annualized expected return per matrix column.
pub trait ReturnEstimator {
    fn name(&self) -> &'static str;

    fn expected_returns(
        &self,
        prices: &PriceMatrix,
        settings: &EstimatorSettings,
    ) -> Result<DVector<f64>, EstimationError>;
}

/// Produces an annualized covariance matrix over the matrix columns.
pub trait RiskEstimator {
    fn name(&self) -> &'static str;

    fn covariance(
        &self,
        prices: &PriceMatrix,
        settings: &EstimatorSettings,
    ) -> Result<DMatrix<f64>, EstimationError>;
}

/// Expected returns and covariance for one matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationInputs {
    pub expected_returns: DVector<f64>,
    pub covariance: DMatrix<f64>,
}

/// Runs both estimators on the same matrix.
pub fn estimate(
    prices: &PriceMatrix,
    returns: &impl ReturnEstimator,
    risk: &impl RiskEstimator,
    settings: &EstimatorSettings,
) -> Result<EstimationInputs, EstimationError> {
    Ok(EstimationInputs {
        expected_returns: returns.expected_returns(prices, settings)?,
        covariance: risk.covariance(prices, settings)?,
    })
}

pub(crate) fn require_rows(
    returns: &DMatrix<f64>,
    method: &'static str,
    needed: usize,
) -> Result<(), EstimationError> {
    if returns.nrows() < needed {
        return Err(EstimationError::TooFewObservations {
            method,
            needed,
            got: returns.nrows(),
        });
    }
    Ok(())
}

/// Normalized adjusted exponential weights for `n` observations, oldest first.
pub(crate) fn ewm_weights(n: usize, span: usize) -> DVector<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let raw = DVector::from_fn(n, |i, _| (1.0 - alpha).powi((n - 1 - i) as i32));
    let total = raw.sum();
    raw / total
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};
    use nalgebra::DMatrix;

    use crate::series::PriceMatrix;

    /// Builds a matrix from per-column price paths on consecutive days.
    pub fn matrix(columns: &[&[f64]]) -> PriceMatrix {
        let rows = columns[0].len();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let symbols = (0..columns.len()).map(|j| format!("S{j}")).collect();
        let dates = (0..rows).map(|i| start + Duration::days(i as i64)).collect();
        let prices = DMatrix::from_fn(rows, columns.len(), |i, j| columns[j][i]);
        PriceMatrix::new(symbols, dates, prices)
    }
}
