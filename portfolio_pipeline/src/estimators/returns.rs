use std::{fmt, str::FromStr};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{
    estimators::{EstimationError, EstimatorSettings, ReturnEstimator, ewm_weights, require_rows},
    series::PriceMatrix,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnsMethod {
    /// Geometric mean of period returns, compounded to a year.
    #[default]
    #[serde(rename = "mean_historical_return")]
    MeanHistorical,
    /// Exponentially weighted mean of period returns, compounded to a year.
    #[serde(rename = "ema_historical_return")]
    EmaHistorical,
}

impl ReturnsMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnsMethod::MeanHistorical => "mean_historical_return",
            ReturnsMethod::EmaHistorical => "ema_historical_return",
        }
    }
}

impl fmt::Display for ReturnsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnsMethod {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean_historical_return" | "mean_historical" | "mean" => Ok(ReturnsMethod::MeanHistorical),
            "ema_historical_return" | "ema_historical" | "ema" => Ok(ReturnsMethod::EmaHistorical),
            _ => Err(EstimationError::UnknownMethod {
                kind: "returns",
                name: s.to_string(),
            }),
        }
    }
}

impl ReturnEstimator for ReturnsMethod {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn expected_returns(
        &self,
        prices: &PriceMatrix,
        settings: &EstimatorSettings,
    ) -> Result<DVector<f64>, EstimationError> {
        let returns = prices.returns();
        require_rows(&returns, self.as_str(), 1)?;
        let frequency = settings.periods_per_year();
        let periods = returns.nrows() as f64;

        let mu = match self {
            ReturnsMethod::MeanHistorical => DVector::from_iterator(
                returns.ncols(),
                returns.column_iter().map(|col| {
                    let growth: f64 = col.iter().map(|r| 1.0 + r).product();
                    growth.powf(frequency / periods) - 1.0
                }),
            ),
            ReturnsMethod::EmaHistorical => {
                let weights = ewm_weights(returns.nrows(), settings.ema_span);
                DVector::from_iterator(
                    returns.ncols(),
                    returns
                        .column_iter()
                        .map(|col| (1.0 + col.dot(&weights)).powf(frequency) - 1.0),
                )
            }
        };

        if mu.iter().all(|v| v.is_finite()) {
            Ok(mu)
        } else {
            Err(EstimationError::NonFinite {
                method: self.as_str(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::estimators::test_support::matrix;

    #[test]
    fn mean_historical_compounds_total_growth() {
        // 10 -> 12.1 over two periods: 10% per period.
        let prices = matrix(&[&[10.0, 11.0, 12.1]]);
        let settings = EstimatorSettings {
            frequency: Some(4),
            ..EstimatorSettings::default()
        };
        let mu = ReturnsMethod::MeanHistorical.expected_returns(&prices, &settings).unwrap();
        assert_relative_eq!(mu[0], 1.1_f64.powi(4) - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ema_with_long_span_is_close_to_arithmetic_mean() {
        let prices = matrix(&[&[100.0, 110.0, 99.0]]);
        let settings = EstimatorSettings {
            frequency: Some(1),
            ema_span: 1_000_000,
            ..EstimatorSettings::default()
        };
        let mu = ReturnsMethod::EmaHistorical.expected_returns(&prices, &settings).unwrap();
        assert_relative_eq!(mu[0], (0.1 - 0.1) / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn ema_weights_recent_returns_more() {
        // Flat, then a jump on the last day.
        let prices = matrix(&[&[10.0, 10.0, 10.0, 11.0]]);
        let settings = EstimatorSettings {
            frequency: Some(1),
            ema_span: 2,
            ..EstimatorSettings::default()
        };
        let ema = ReturnsMethod::EmaHistorical.expected_returns(&prices, &settings).unwrap()[0];
        let mean = ReturnsMethod::MeanHistorical.expected_returns(&prices, &settings).unwrap()[0];
        assert!(ema > mean);
    }

    #[test]
    fn needs_two_prices() {
        let prices = matrix(&[&[10.0]]);
        let err = ReturnsMethod::MeanHistorical
            .expected_returns(&prices, &EstimatorSettings::default())
            .unwrap_err();
        assert!(matches!(err, EstimationError::TooFewObservations { got: 0, .. }));
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("mean_historical_return".parse::<ReturnsMethod>().unwrap(), ReturnsMethod::MeanHistorical);
        assert_eq!(" EMA ".parse::<ReturnsMethod>().unwrap(), ReturnsMethod::EmaHistorical);
        assert!("capm".parse::<ReturnsMethod>().is_err());
    }
}
