//! Allocation Optimizer: estimation inputs in, cleaned weights and
//! performance metrics out.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::PipelineError,
    estimators::{EstimationInputs, EstimatorSettings, ReturnsMethod, RiskMethod, estimate},
    series::PriceMatrix,
    solver::{Objective, Problem, Solver, WeightBounds},
};

/// Volatility below this is treated as zero when computing Sharpe.
pub const ZERO_VOLATILITY: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    #[default]
    MaxSharpe,
    MinVolatility,
    MaxUtility,
}

impl ObjectiveKind {
    pub const ALL: [ObjectiveKind; 3] = [
        ObjectiveKind::MaxSharpe,
        ObjectiveKind::MinVolatility,
        ObjectiveKind::MaxUtility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveKind::MaxSharpe => "max_sharpe",
            ObjectiveKind::MinVolatility => "min_volatility",
            ObjectiveKind::MaxUtility => "max_utility",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectiveKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "max_sharpe" | "sharpe" => Ok(ObjectiveKind::MaxSharpe),
            "min_volatility" | "min_vol" | "min_variance" => Ok(ObjectiveKind::MinVolatility),
            "max_utility" | "max_quadratic_utility" | "utility" => Ok(ObjectiveKind::MaxUtility),
            _ => Err(PipelineError::InvalidRequest(format!("unknown objective: {s}"))),
        }
    }
}

/// Post-processing of solver weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightCleaning {
    /// `|w|` below this becomes exactly zero.
    pub cutoff: f64,
    /// Decimal places to round to; `None` keeps full precision.
    pub rounding: Option<u32>,
}

impl Default for WeightCleaning {
    fn default() -> Self {
        Self {
            cutoff: 1e-4,
            rounding: Some(5),
        }
    }
}

impl WeightCleaning {
    /// Zeroes dust, then rounds. The result is not renormalized.
    pub fn apply(&self, w: f64) -> f64 {
        if w.abs() < self.cutoff {
            return 0.0;
        }
        match self.rounding {
            Some(places) => {
                let scale = 10f64.powi(places as i32);
                (w * scale).round() / scale
            }
            None => w,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub objective: ObjectiveKind,
    /// Annualized, decimal.
    pub risk_free_rate: f64,
    /// Only used by [`ObjectiveKind::MaxUtility`].
    pub risk_aversion: f64,
    /// Applied to every symbol without an override.
    pub bounds: WeightBounds,
    pub symbol_bounds: IndexMap<String, WeightBounds>,
    pub returns_method: ReturnsMethod,
    pub risk_method: RiskMethod,
    pub cleaning: WeightCleaning,
}

impl Default for OptimizationRequest {
    fn default() -> Self {
        Self {
            objective: ObjectiveKind::default(),
            risk_free_rate: 0.02,
            risk_aversion: 1.0,
            bounds: WeightBounds::default(),
            symbol_bounds: IndexMap::new(),
            returns_method: ReturnsMethod::default(),
            risk_method: RiskMethod::default(),
            cleaning: WeightCleaning::default(),
        }
    }
}

impl OptimizationRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.risk_free_rate.is_finite() {
            return Err(PipelineError::InvalidRequest("risk-free rate must be finite".into()));
        }
        if !self.risk_aversion.is_finite() || self.risk_aversion <= 0.0 {
            return Err(PipelineError::InvalidRequest(format!(
                "risk aversion must be a positive number, got {}",
                self.risk_aversion
            )));
        }
        for (symbol, b) in std::iter::once(("*", &self.bounds))
            .chain(self.symbol_bounds.iter().map(|(s, b)| (s.as_str(), b)))
        {
            if WeightBounds::new(b.lower, b.upper).is_none() {
                return Err(PipelineError::InvalidRequest(format!(
                    "invalid weight bounds for {symbol}: [{}, {}]",
                    b.lower, b.upper
                )));
            }
        }
        Ok(())
    }

    fn bounds_for(&self, symbols: &[String]) -> Vec<WeightBounds> {
        symbols
            .iter()
            .map(|s| self.symbol_bounds.get(s).copied().unwrap_or(self.bounds))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    /// Cleaned weights in matrix column order.
    pub weights: IndexMap<String, f64>,
    pub expected_annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
}

/// Estimates inputs from `prices` and solves for the requested objective.
pub fn optimize(
    prices: &PriceMatrix,
    request: &OptimizationRequest,
    solver: &impl Solver,
    settings: &EstimatorSettings,
) -> Result<AllocationResult, PipelineError> {
    request.validate()?;
    let inputs = estimate(prices, &request.returns_method, &request.risk_method, settings)?;
    allocate(prices.symbols(), &inputs, request, solver)
}

/// Solves one objective over already-estimated inputs.
///
/// `request` must already have passed [`OptimizationRequest::validate`].
pub fn allocate(
    symbols: &[String],
    inputs: &EstimationInputs,
    request: &OptimizationRequest,
    solver: &impl Solver,
) -> Result<AllocationResult, PipelineError> {
    if symbols.len() < 2 {
        return Err(PipelineError::InsufficientData {
            survived: symbols.to_vec(),
            observations: 0,
            dropped: Vec::new(),
        });
    }

    let mu = &inputs.expected_returns;
    let cov = &inputs.covariance;
    let objective = match request.objective {
        ObjectiveKind::MinVolatility => Objective::MinVolatility { cov: cov.clone() },
        ObjectiveKind::MaxSharpe => Objective::MaxSharpe {
            mu: mu.clone(),
            cov: cov.clone(),
            risk_free_rate: request.risk_free_rate,
        },
        ObjectiveKind::MaxUtility => Objective::MaxUtility {
            mu: mu.clone(),
            cov: cov.clone(),
            risk_aversion: request.risk_aversion,
        },
    };
    let problem = Problem {
        objective,
        bounds: request.bounds_for(symbols),
    };

    let raw = solver
        .solve(&problem)
        .map_err(|source| PipelineError::Optimization {
            objective: request.objective,
            symbols: symbols.len(),
            source,
        })?;

    let result = performance(symbols, &raw, inputs, request);
    info!(
        objective = %request.objective,
        expected_return = result.expected_annual_return,
        volatility = result.annual_volatility,
        sharpe = result.sharpe_ratio,
        "allocation solved"
    );
    Ok(result)
}

/// Metrics come from the raw solver weights; only the reported weights are cleaned.
fn performance(
    symbols: &[String],
    raw: &DVector<f64>,
    inputs: &EstimationInputs,
    request: &OptimizationRequest,
) -> AllocationResult {
    let expected_annual_return = raw.dot(&inputs.expected_returns);
    let variance = raw.dot(&(&inputs.covariance * raw));
    let annual_volatility = variance.max(0.0).sqrt();
    let sharpe_ratio = if annual_volatility < ZERO_VOLATILITY {
        0.0
    } else {
        (expected_annual_return - request.risk_free_rate) / annual_volatility
    };

    let weights = symbols
        .iter()
        .cloned()
        .zip(raw.iter().map(|&w| request.cleaning.apply(w)))
        .collect();

    AllocationResult {
        weights,
        expected_annual_return,
        annual_volatility,
        sharpe_ratio,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use super::*;
    use crate::{estimators::test_support::matrix, solver::ProjectedGradientSolver};

    fn inputs() -> EstimationInputs {
        EstimationInputs {
            expected_returns: DVector::from_vec(vec![0.10, 0.12]),
            covariance: DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.09]),
        }
    }

    fn symbols() -> Vec<String> {
        vec!["AAA".into(), "BBB".into()]
    }

    #[test]
    fn cleaning_zeroes_dust_and_rounds_without_renormalizing() {
        let cleaning = WeightCleaning::default();
        assert_eq!(cleaning.apply(0.00009), 0.0);
        assert_eq!(cleaning.apply(-0.00009), 0.0);
        assert_eq!(cleaning.apply(0.123456789), 0.12346);
        let none = WeightCleaning {
            rounding: None,
            ..cleaning
        };
        assert_eq!(none.apply(0.123456789), 0.123456789);
    }

    #[test]
    fn metrics_follow_the_raw_weights() {
        let request = OptimizationRequest {
            objective: ObjectiveKind::MinVolatility,
            ..OptimizationRequest::default()
        };
        let result = allocate(&symbols(), &inputs(), &request, &ProjectedGradientSolver::default()).unwrap();

        // w = [0.09, 0.04] / 0.13
        let w0 = 0.09 / 0.13;
        let w1 = 0.04 / 0.13;
        assert_relative_eq!(result.weights["AAA"], w0, epsilon = 1e-5);
        assert_relative_eq!(result.expected_annual_return, 0.10 * w0 + 0.12 * w1, epsilon = 1e-6);
        let vol = (0.04 * w0 * w0 + 0.09 * w1 * w1).sqrt();
        assert_relative_eq!(result.annual_volatility, vol, epsilon = 1e-6);
        assert_relative_eq!(
            result.sharpe_ratio,
            (result.expected_annual_return - 0.02) / result.annual_volatility,
            epsilon = 1e-12
        );
    }

    #[test]
    fn zero_volatility_reports_zero_sharpe() {
        let inputs = EstimationInputs {
            expected_returns: DVector::from_vec(vec![0.0, 0.0]),
            covariance: DMatrix::zeros(2, 2),
        };
        let request = OptimizationRequest {
            objective: ObjectiveKind::MinVolatility,
            ..OptimizationRequest::default()
        };
        let result = allocate(&symbols(), &inputs, &request, &ProjectedGradientSolver::default()).unwrap();
        assert_eq!(result.annual_volatility, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
    }

    #[test]
    fn solver_failure_names_objective_and_size() {
        let inputs = EstimationInputs {
            expected_returns: DVector::from_vec(vec![0.0, 0.01]),
            covariance: DMatrix::identity(2, 2) * 0.04,
        };
        let err = allocate(
            &symbols(),
            &inputs,
            &OptimizationRequest::default(),
            &ProjectedGradientSolver::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Optimization failed for max_sharpe over 2 symbol(s): no asset has an expected return above the risk-free rate"
        );
    }

    #[test]
    fn per_symbol_bounds_apply() {
        let mut request = OptimizationRequest {
            objective: ObjectiveKind::MaxUtility,
            risk_aversion: 0.1,
            ..OptimizationRequest::default()
        };
        request
            .symbol_bounds
            .insert("BBB".into(), WeightBounds::new(0.0, 0.25).unwrap());
        let result = allocate(&symbols(), &inputs(), &request, &ProjectedGradientSolver::default()).unwrap();
        assert!(result.weights["BBB"] <= 0.25);
        assert_relative_eq!(result.weights.values().sum::<f64>(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let request = OptimizationRequest {
            risk_aversion: 0.0,
            ..OptimizationRequest::default()
        };
        assert!(matches!(request.validate(), Err(PipelineError::InvalidRequest(_))));

        let request = OptimizationRequest {
            bounds: WeightBounds {
                lower: 0.6,
                upper: 0.4,
            },
            ..OptimizationRequest::default()
        };
        assert!(matches!(request.validate(), Err(PipelineError::InvalidRequest(_))));
    }

    #[test]
    fn optimize_rejects_bad_parameters_before_estimating() {
        // One row: estimation would fail too, so the error proves the order.
        let prices = matrix(&[&[100.0], &[50.0]]);
        let request = OptimizationRequest {
            risk_aversion: f64::NAN,
            ..OptimizationRequest::default()
        };
        let err = optimize(
            &prices,
            &request,
            &ProjectedGradientSolver::default(),
            &EstimatorSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(msg) if msg.contains("risk aversion")));
    }

    #[test]
    fn optimize_runs_end_to_end_on_prices() {
        let prices = matrix(&[
            &[100.0, 101.0, 100.5, 102.0, 103.0, 102.5, 104.0],
            &[50.0, 50.5, 51.5, 51.0, 52.0, 53.0, 52.5],
        ]);
        let request = OptimizationRequest {
            objective: ObjectiveKind::MinVolatility,
            ..OptimizationRequest::default()
        };
        let result = optimize(
            &prices,
            &request,
            &ProjectedGradientSolver::default(),
            &EstimatorSettings::default(),
        )
        .unwrap();
        assert_eq!(result.weights.keys().collect::<Vec<_>>(), vec!["S0", "S1"]);
        assert!(result.annual_volatility >= 0.0);
        assert!(result.sharpe_ratio.is_finite());
    }

    #[test]
    fn objective_names_parse() {
        assert_eq!("min-volatility".parse::<ObjectiveKind>().unwrap(), ObjectiveKind::MinVolatility);
        assert_eq!("MAX_SHARPE".parse::<ObjectiveKind>().unwrap(), ObjectiveKind::MaxSharpe);
        assert!("max_return".parse::<ObjectiveKind>().is_err());
    }
}
