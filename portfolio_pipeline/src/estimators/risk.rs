use std::{fmt, str::FromStr};

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    estimators::{EstimationError, EstimatorSettings, RiskEstimator, ewm_weights, require_rows},
    series::PriceMatrix,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskMethod {
    /// Unbiased sample covariance.
    #[default]
    #[serde(rename = "sample_cov")]
    SampleCov,
    /// Ledoit-Wolf shrinkage toward a scaled identity.
    #[serde(rename = "ledoit_wolf", alias = "shrinkage")]
    LedoitWolf,
    /// Exponentially weighted covariance.
    #[serde(rename = "exp_cov")]
    ExpCov,
    /// Covariance of returns below the benchmark only.
    #[serde(rename = "semicovariance")]
    Semicovariance,
}

impl RiskMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskMethod::SampleCov => "sample_cov",
            RiskMethod::LedoitWolf => "ledoit_wolf",
            RiskMethod::ExpCov => "exp_cov",
            RiskMethod::Semicovariance => "semicovariance",
        }
    }
}

impl fmt::Display for RiskMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskMethod {
    type Err = EstimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sample_cov" | "sample" => Ok(RiskMethod::SampleCov),
            "ledoit_wolf" | "shrinkage" | "covariance_shrinkage" => Ok(RiskMethod::LedoitWolf),
            "exp_cov" | "exponential" => Ok(RiskMethod::ExpCov),
            "semicovariance" | "semicov" => Ok(RiskMethod::Semicovariance),
            _ => Err(EstimationError::UnknownMethod {
                kind: "risk",
                name: s.to_string(),
            }),
        }
    }
}

impl RiskEstimator for RiskMethod {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn covariance(
        &self,
        prices: &PriceMatrix,
        settings: &EstimatorSettings,
    ) -> Result<DMatrix<f64>, EstimationError> {
        let returns = prices.returns();
        let frequency = settings.periods_per_year();

        let cov = match self {
            RiskMethod::SampleCov => {
                require_rows(&returns, self.as_str(), 2)?;
                let x = centered(&returns);
                x.transpose() * &x / (returns.nrows() as f64 - 1.0)
            }
            RiskMethod::LedoitWolf => {
                require_rows(&returns, self.as_str(), 1)?;
                ledoit_wolf(&returns)
            }
            RiskMethod::ExpCov => {
                require_rows(&returns, self.as_str(), 1)?;
                let x = centered(&returns);
                let weights = ewm_weights(returns.nrows(), settings.cov_span);
                let weighted = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] * weights[i]);
                weighted.transpose() * &x
            }
            RiskMethod::Semicovariance => {
                require_rows(&returns, self.as_str(), 1)?;
                let benchmark = settings.semicov_benchmark();
                let drops = returns.map(|r| (r - benchmark).min(0.0));
                drops.transpose() * &drops / returns.nrows() as f64
            }
        } * frequency;

        if cov.iter().any(|v| !v.is_finite()) {
            return Err(EstimationError::NonFinite {
                method: self.as_str(),
            });
        }
        Ok(fix_nonpositive_semidefinite(cov, self.as_str()))
    }
}

/// Subtracts each column's mean.
fn centered(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let means = returns.row_mean();
    DMatrix::from_fn(returns.nrows(), returns.ncols(), |i, j| returns[(i, j)] - means[j])
}

/// Ledoit-Wolf shrunk covariance (per period), target `mu * I`.
fn ledoit_wolf(returns: &DMatrix<f64>) -> DMatrix<f64> {
    let x = centered(returns);
    let n = x.nrows() as f64;
    let p = x.ncols();

    let emp_cov = x.transpose() * &x / n;
    if p == 1 {
        return emp_cov;
    }

    let mu = emp_cov.trace() / p as f64;
    let x2 = x.map(|v| v * v);
    let beta_sum = (x2.transpose() * &x2).sum();
    let delta_sum = (x.transpose() * &x).map(|v| v * v).sum() / (n * n);

    let beta = (beta_sum / n - delta_sum) / (p as f64 * n);
    let delta = (delta_sum - 2.0 * mu * emp_cov.trace() + p as f64 * mu * mu) / p as f64;
    let beta = beta.min(delta);
    let shrinkage = if beta <= 0.0 || delta <= 0.0 { 0.0 } else { beta / delta };

    let target = DMatrix::<f64>::identity(p, p) * mu;
    emp_cov * (1.0 - shrinkage) + target * shrinkage
}

/// Clips negative eigenvalues to zero when numerical noise breaks PSD-ness.
fn fix_nonpositive_semidefinite(cov: DMatrix<f64>, method: &str) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(cov.clone());
    if eigen.eigenvalues.iter().all(|&v| v >= -1e-12) {
        return cov;
    }
    warn!(method, "covariance matrix is not positive semidefinite; clipping eigenvalues");
    let clipped = DVector::from_iterator(eigen.eigenvalues.len(), eigen.eigenvalues.iter().map(|v| v.max(0.0)));
    let fixed = &eigen.eigenvectors * DMatrix::from_diagonal(&clipped) * eigen.eigenvectors.transpose();
    (&fixed + fixed.transpose()) * 0.5
}
