//! The three portfolio operations exposed to callers.

use chrono::NaiveDate;
use indexmap::IndexMap;
use tracing::{info, instrument, warn};
use vn_market_data::{models::asset::AssetCategory, providers::PriceSource};

use crate::{
    align::{AlignedPrices, AlignmentPolicy, align},
    config::AppConfig,
    errors::PipelineError,
    estimators::{EstimationError, ReturnEstimator, ReturnsMethod, RiskMethod, estimate},
    fetch::{FetchOptions, fetch_all, unique_symbols},
    optimizer::{ObjectiveKind, OptimizationRequest, allocate},
    report::{
        AllocationReport, Diagnostics, ExpectedReturnsReport, FullOptimizationReport, ObjectiveSlot,
    },
    series::DateWindow,
    solver::WeightBounds,
};

/// Caller-facing parameters of an allocation run.
///
/// `None` falls back to the configured default.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationQuery {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub objective: ObjectiveKind,
    pub risk_free_rate: Option<f64>,
    pub risk_aversion: Option<f64>,
    pub returns_method: ReturnsMethod,
    pub risk_method: RiskMethod,
    pub bounds: WeightBounds,
}

impl AllocationQuery {
    pub fn new(symbols: Vec<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbols,
            start,
            end,
            objective: ObjectiveKind::default(),
            risk_free_rate: None,
            risk_aversion: None,
            returns_method: ReturnsMethod::default(),
            risk_method: RiskMethod::default(),
            bounds: WeightBounds::default(),
        }
    }
}

/// Runs fetch, normalize, align, estimate and optimize against one source.
///
/// Holds no state between calls beyond its configuration.
pub struct PortfolioService<S> {
    config: AppConfig,
    source: S,
}

impl<S: PriceSource> PortfolioService<S> {
    pub fn new(config: AppConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Annualized expected return per symbol.
    #[instrument(skip(self, symbols), fields(symbols = symbols.len()))]
    pub async fn expected_returns(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        method: ReturnsMethod,
    ) -> Result<ExpectedReturnsReport, PipelineError> {
        let aligned = self
            .prepare(symbols, start, end, AlignmentPolicy::single_asset())
            .await?;
        let mu = method
            .expected_returns(&aligned.matrix, &self.config.estimation)
            .map_err(|e| estimation_failure(&aligned, e))?;

        let expected_returns: IndexMap<String, f64> = aligned
            .matrix
            .symbols()
            .iter()
            .cloned()
            .zip(mu.iter().copied())
            .collect();
        info!(symbols = expected_returns.len(), %method, "expected returns computed");
        Ok(ExpectedReturnsReport {
            expected_returns,
            diagnostics: Diagnostics::new(&aligned, method, None),
        })
    }

    /// Weights and performance for one objective.
    #[instrument(skip(self, query), fields(symbols = query.symbols.len(), objective = %query.objective))]
    pub async fn optimize_allocation(&self, query: &AllocationQuery) -> Result<AllocationReport, PipelineError> {
        let request = self.request_for(query, query.objective);
        request.validate()?;

        let aligned = self
            .prepare(&query.symbols, query.start, query.end, AlignmentPolicy::default())
            .await?;
        let inputs = estimate(
            &aligned.matrix,
            &query.returns_method,
            &query.risk_method,
            &self.config.estimation,
        )
        .map_err(|e| estimation_failure(&aligned, e))?;
        let allocation = allocate(
            aligned.matrix.symbols(),
            &inputs,
            &request,
            &self.config.optimizer.solver(),
        )?;

        Ok(AllocationReport {
            objective: query.objective,
            allocation,
            diagnostics: Diagnostics::new(&aligned, query.returns_method, Some(query.risk_method)),
        })
    }

    /// All three objectives over the same estimates, side by side.
    ///
    /// An objective that cannot be solved is reported in its own slot; only
    /// data-stage failures abort the whole call.
    #[instrument(skip(self, query), fields(symbols = query.symbols.len()))]
    pub async fn full_optimization(&self, query: &AllocationQuery) -> Result<FullOptimizationReport, PipelineError> {
        let base = self.request_for(query, ObjectiveKind::MaxSharpe);
        base.validate()?;

        let aligned = self
            .prepare(&query.symbols, query.start, query.end, AlignmentPolicy::default())
            .await?;
        let inputs = estimate(
            &aligned.matrix,
            &query.returns_method,
            &query.risk_method,
            &self.config.estimation,
        )
        .map_err(|e| estimation_failure(&aligned, e))?;
        let solver = self.config.optimizer.solver();
        let symbols = aligned.matrix.symbols();

        let [max_sharpe, min_volatility, max_utility] = ObjectiveKind::ALL.map(|objective| {
            let request = OptimizationRequest {
                objective,
                ..base.clone()
            };
            ObjectiveSlot::from(allocate(symbols, &inputs, &request, &solver))
        });

        Ok(FullOptimizationReport {
            max_sharpe,
            min_volatility,
            max_utility,
            risk_free_rate: base.risk_free_rate,
            risk_aversion: base.risk_aversion,
            diagnostics: Diagnostics::new(&aligned, query.returns_method, Some(query.risk_method)),
        })
    }

    fn request_for(&self, query: &AllocationQuery, objective: ObjectiveKind) -> OptimizationRequest {
        let defaults = &self.config.optimizer;
        OptimizationRequest {
            objective,
            risk_free_rate: query.risk_free_rate.unwrap_or(defaults.risk_free_rate),
            risk_aversion: query.risk_aversion.unwrap_or(defaults.risk_aversion),
            bounds: query.bounds,
            symbol_bounds: IndexMap::new(),
            returns_method: query.returns_method,
            risk_method: query.risk_method,
            cleaning: defaults.cleaning(),
        }
    }

    /// Fetch, normalize and align; the shared front half of every operation.
    async fn prepare(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        policy: AlignmentPolicy,
    ) -> Result<AlignedPrices, PipelineError> {
        let window = DateWindow::new(start, end)?;
        let symbols = unique_symbols(symbols);
        if symbols.is_empty() {
            return Err(PipelineError::InvalidRequest("no symbols requested".into()));
        }
        if symbols.len() < policy.min_symbols {
            return Err(PipelineError::InsufficientData {
                survived: symbols,
                observations: 0,
                dropped: Vec::new(),
            });
        }

        let options = FetchOptions {
            interval: self.config.fetch.interval,
            category: AssetCategory::Stock,
            timeout: self.config.fetch.timeout(),
        };
        let outcomes = fetch_all(&self.source, &symbols, window, options).await;
        align(outcomes, window, policy)
    }
}

/// A matrix that passed alignment but is still too short for the chosen
/// estimator is reported like any other shortage of aligned data.
fn estimation_failure(aligned: &AlignedPrices, err: EstimationError) -> PipelineError {
    match err {
        EstimationError::TooFewObservations { .. } => {
            warn!(error = %err, "aligned matrix too short to estimate");
            PipelineError::InsufficientData {
                survived: aligned.matrix.symbols().to_vec(),
                observations: aligned.matrix.n_observations(),
                dropped: aligned.dropped.clone(),
            }
        }
        other => other.into(),
    }
}
