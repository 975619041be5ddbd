//! Constrained portfolio solver.
//!
//! Every problem lives on the same feasible set: weights sum to one and each
//! weight stays inside its own `[lower, upper]` interval. [`ProjectedGradientSolver`]
//! runs spectral projected gradient steps with a non-monotone line search,
//! projecting onto that set exactly after each step.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Inclusive bounds for one asset weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }
}

impl WeightBounds {
    pub fn new(lower: f64, upper: f64) -> Option<Self> {
        (lower.is_finite() && upper.is_finite() && lower <= upper).then_some(Self { lower, upper })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Objective {
    /// Minimize `wᵀΣw`.
    MinVolatility { cov: DMatrix<f64> },
    /// Maximize `(μᵀw - rf) / sqrt(wᵀΣw)`.
    MaxSharpe {
        mu: DVector<f64>,
        cov: DMatrix<f64>,
        risk_free_rate: f64,
    },
    /// Maximize `μᵀw - δ/2 · wᵀΣw`.
    MaxUtility {
        mu: DVector<f64>,
        cov: DMatrix<f64>,
        risk_aversion: f64,
    },
}

impl Objective {
    fn cov(&self) -> &DMatrix<f64> {
        match self {
            Objective::MinVolatility { cov }
            | Objective::MaxSharpe { cov, .. }
            | Objective::MaxUtility { cov, .. } => cov,
        }
    }

    fn mu(&self) -> Option<&DVector<f64>> {
        match self {
            Objective::MinVolatility { .. } => None,
            Objective::MaxSharpe { mu, .. } | Objective::MaxUtility { mu, .. } => Some(mu),
        }
    }

    /// Value to minimize and its gradient.
    fn evaluate(&self, w: &DVector<f64>) -> (f64, DVector<f64>) {
        let cov = self.cov();
        let sigma_w = cov * w;
        let variance = w.dot(&sigma_w);
        match self {
            Objective::MinVolatility { .. } => (variance, sigma_w * 2.0),
            Objective::MaxUtility { mu, risk_aversion, .. } => {
                let value = -(mu.dot(w) - 0.5 * risk_aversion * variance);
                (value, sigma_w * *risk_aversion - mu)
            }
            Objective::MaxSharpe {
                mu, risk_free_rate, ..
            } => {
                let vol = variance.max(0.0).sqrt();
                if vol < 1e-12 {
                    return (f64::NAN, DVector::from_element(w.len(), f64::NAN));
                }
                let excess = mu.dot(w) - risk_free_rate;
                let grad = -(mu / vol - sigma_w * (excess / (vol * vol * vol)));
                (-excess / vol, grad)
            }
        }
    }
}

/// One allocation problem over `bounds.len()` assets.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub objective: Objective,
    pub bounds: Vec<WeightBounds>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("weight bounds admit no fully invested portfolio")]
    InfeasibleBounds,

    #[error("problem dimensions disagree: {0}")]
    DimensionMismatch(String),

    #[error("did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("objective became non-finite")]
    NonFinite,

    #[error("no asset has an expected return above the risk-free rate")]
    NoPositiveExcessReturn,
}

/// Solves an allocation [`Problem`] to a weight vector.
pub trait Solver {
    fn solve(&self, problem: &Problem) -> Result<DVector<f64>, SolverError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedGradientSolver {
    pub max_iterations: usize,
    /// Stop once the projected gradient step is below this (infinity norm).
    pub tolerance: f64,
}

impl Default for ProjectedGradientSolver {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            tolerance: 1e-10,
        }
    }
}

const STEP_MIN: f64 = 1e-12;
const STEP_MAX: f64 = 1e12;
const SUFFICIENT_DECREASE: f64 = 1e-4;
const NONMONOTONE_MEMORY: usize = 10;

impl Solver for ProjectedGradientSolver {
    fn solve(&self, problem: &Problem) -> Result<DVector<f64>, SolverError> {
        validate(problem)?;
        let objective = &problem.objective;
        let bounds = &problem.bounds;

        let mut w = starting_point(problem);
        let (mut f, mut g) = objective.evaluate(&w);
        if !f.is_finite() {
            return Err(SolverError::NonFinite);
        }

        let mut history = vec![f];
        let mut step = {
            let pg = project(&(&w - &g), bounds) - &w;
            1.0 / pg.amax().max(STEP_MIN)
        }
        .clamp(STEP_MIN, STEP_MAX);

        for iteration in 0..self.max_iterations {
            let pg_norm = (project(&(&w - &g), bounds) - &w).amax();
            if pg_norm <= self.tolerance {
                debug!(iteration, objective = f, "solver converged");
                return Ok(w);
            }

            let d = project(&(&w - &g * step), bounds) - &w;
            let slope = g.dot(&d);
            let reference = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            let mut lambda = 1.0;
            let accepted = loop {
                let candidate = &w + &d * lambda;
                let (fc, gc) = objective.evaluate(&candidate);
                if fc.is_finite() && fc <= reference + SUFFICIENT_DECREASE * lambda * slope {
                    break Some((candidate, fc, gc));
                }
                lambda *= 0.5;
                if lambda < 1e-20 {
                    break None;
                }
            };

            let Some((next, f_next, g_next)) = accepted else {
                // Progress is below floating-point resolution.
                if pg_norm <= self.tolerance.sqrt() {
                    debug!(iteration, pg_norm, "solver stopped at numerical precision");
                    return Ok(w);
                }
                return Err(SolverError::NotConverged { iterations: iteration });
            };

            let s = &next - &w;
            let y = &g_next - &g;
            let sy = s.dot(&y);
            step = if sy <= 0.0 {
                STEP_MAX
            } else {
                (s.dot(&s) / sy).clamp(STEP_MIN, STEP_MAX)
            };

            w = next;
            f = f_next;
            g = g_next;
            history.push(f);
            if history.len() > NONMONOTONE_MEMORY {
                history.remove(0);
            }
        }

        Err(SolverError::NotConverged {
            iterations: self.max_iterations,
        })
    }
}

fn validate(problem: &Problem) -> Result<(), SolverError> {
    let n = problem.bounds.len();
    let cov = problem.objective.cov();
    if n == 0 || cov.shape() != (n, n) {
        return Err(SolverError::DimensionMismatch(format!(
            "{n} bounds for a {}x{} covariance",
            cov.nrows(),
            cov.ncols()
        )));
    }
    if let Some(mu) = problem.objective.mu() {
        if mu.len() != n {
            return Err(SolverError::DimensionMismatch(format!(
                "{n} bounds for {} expected returns",
                mu.len()
            )));
        }
    }
    if cov.iter().chain(problem.objective.mu().into_iter().flatten()).any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite);
    }

    let lower: f64 = problem.bounds.iter().map(|b| b.lower).sum();
    let upper: f64 = problem.bounds.iter().map(|b| b.upper).sum();
    let valid = problem
        .bounds
        .iter()
        .all(|b| b.lower.is_finite() && b.upper.is_finite() && b.lower <= b.upper);
    if !valid || lower > 1.0 + 1e-12 || upper < 1.0 - 1e-12 {
        return Err(SolverError::InfeasibleBounds);
    }

    if let Objective::MaxSharpe {
        mu, risk_free_rate, ..
    } = &problem.objective
    {
        if mu.iter().all(|&m| m <= *risk_free_rate) {
            return Err(SolverError::NoPositiveExcessReturn);
        }
    }
    Ok(())
}

/// Equal weights projected onto the feasible set; for max Sharpe, falls back
/// to the best single asset when equal weights have no excess return.
fn starting_point(problem: &Problem) -> DVector<f64> {
    let n = problem.bounds.len();
    let equal = project(&DVector::from_element(n, 1.0 / n as f64), &problem.bounds);

    if let Objective::MaxSharpe {
        mu, risk_free_rate, ..
    } = &problem.objective
    {
        if mu.dot(&equal) <= *risk_free_rate {
            let best = mu.argmax().0;
            let mut target = DVector::zeros(n);
            target[best] = 1.0;
            return project(&target, &problem.bounds);
        }
    }
    equal
}

/// Euclidean projection onto `{w : Σw = 1, lower ≤ w ≤ upper}`.
///
/// The projection is `clamp(v - τ)` for the unique shift `τ` that makes the
/// clamped weights sum to one; `τ` is found by bisection.
pub fn project(v: &DVector<f64>, bounds: &[WeightBounds]) -> DVector<f64> {
    let clamp_sum = |tau: f64| -> f64 {
        v.iter()
            .zip(bounds)
            .map(|(x, b)| (x - tau).clamp(b.lower, b.upper))
            .sum()
    };

    let mut lo = v
        .iter()
        .zip(bounds)
        .map(|(x, b)| x - b.upper)
        .fold(f64::INFINITY, f64::min);
    let mut hi = v
        .iter()
        .zip(bounds)
        .map(|(x, b)| x - b.lower)
        .fold(f64::NEG_INFINITY, f64::max);

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if clamp_sum(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= f64::EPSILON * (1.0 + lo.abs().max(hi.abs())) {
            break;
        }
    }

    let tau = 0.5 * (lo + hi);
    DVector::from_iterator(
        v.len(),
        v.iter().zip(bounds).map(|(x, b)| (x - tau).clamp(b.lower, b.upper)),
    )
}
