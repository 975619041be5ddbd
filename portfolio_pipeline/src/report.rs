//! Result Formatter: the JSON shapes returned to callers.
//!
//! Field names are stable snake_case strings and dates are ISO `YYYY-MM-DD`.
//! Terminal failures are rendered as an [`ErrorReport`] instead of a panic or
//! a debug dump.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    align::AlignedPrices,
    errors::PipelineError,
    estimators::{ReturnsMethod, RiskMethod},
    fetch::DroppedSymbol,
    optimizer::{AllocationResult, ObjectiveKind},
};

/// What the estimate was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub observations: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub symbols_used: Vec<String>,
    pub dropped: Vec<DroppedSymbol>,
    pub returns_method: ReturnsMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_method: Option<RiskMethod>,
}

impl Diagnostics {
    pub fn new(aligned: &AlignedPrices, returns_method: ReturnsMethod, risk_method: Option<RiskMethod>) -> Self {
        let matrix = &aligned.matrix;
        Self {
            observations: matrix.n_observations(),
            start_date: matrix.start_date(),
            end_date: matrix.end_date(),
            symbols_used: matrix.symbols().to_vec(),
            dropped: aligned.dropped.clone(),
            returns_method,
            risk_method,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedReturnsReport {
    pub expected_returns: IndexMap<String, f64>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    pub objective: ObjectiveKind,
    #[serde(flatten)]
    pub allocation: AllocationResult,
    pub diagnostics: Diagnostics,
}

/// One objective's outcome inside a [`FullOptimizationReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObjectiveSlot {
    Solved(AllocationResult),
    Failed { error: String },
}

impl From<Result<AllocationResult, PipelineError>> for ObjectiveSlot {
    fn from(result: Result<AllocationResult, PipelineError>) -> Self {
        match result {
            Ok(allocation) => ObjectiveSlot::Solved(allocation),
            Err(e) => ObjectiveSlot::Failed { error: e.to_string() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullOptimizationReport {
    pub max_sharpe: ObjectiveSlot,
    pub min_volatility: ObjectiveSlot,
    pub max_utility: ObjectiveSlot,
    pub risk_free_rate: f64,
    pub risk_aversion: f64,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl From<&PipelineError> for ErrorReport {
    fn from(err: &PipelineError) -> Self {
        let details = match err {
            PipelineError::NoData { symbols, dropped } => json!({
                "symbols": symbols,
                "dropped": dropped,
            }),
            PipelineError::InsufficientData {
                survived,
                observations,
                dropped,
            } => json!({
                "survived": survived,
                "observations": observations,
                "dropped": dropped,
            }),
            PipelineError::Optimization {
                objective, symbols, ..
            } => json!({
                "objective": objective,
                "symbols": symbols,
            }),
            _ => Value::Null,
        };
        Self {
            error: err.kind(),
            message: err.to_string(),
            details,
        }
    }
}

/// Pretty JSON with a two-space indent.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
