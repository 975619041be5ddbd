use thiserror::Error;

use crate::{
    estimators::EstimationError, fetch::DroppedSymbol, optimizer::ObjectiveKind,
    solver::SolverError,
};

/// Terminal failures of a pipeline run.
///
/// Per-symbol problems never appear here on their own; they are carried as
/// [`DroppedSymbol`] diagnostics inside the batch-level variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No data found for any requested symbol: {}", symbols.join(", "))]
    NoData {
        symbols: Vec<String>,
        dropped: Vec<DroppedSymbol>,
    },

    #[error(
        "Insufficient data after alignment: {} symbol(s) with {observations} common observation(s) remain{}",
        survived.len(),
        describe_dropped(dropped)
    )]
    InsufficientData {
        survived: Vec<String>,
        observations: usize,
        dropped: Vec<DroppedSymbol>,
    },

    #[error("Optimization failed for {objective} over {symbols} symbol(s): {source}")]
    Optimization {
        objective: ObjectiveKind,
        symbols: usize,
        #[source]
        source: SolverError,
    },

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    /// Stable machine-readable kind, used as the `error` field of reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoData { .. } => "no_data",
            PipelineError::InsufficientData { .. } => "insufficient_data",
            PipelineError::Optimization { .. } => "optimization",
            PipelineError::Estimation(_) => "estimation",
            PipelineError::InvalidRequest(_) => "invalid_request",
        }
    }
}

fn describe_dropped(dropped: &[DroppedSymbol]) -> String {
    if dropped.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = dropped
        .iter()
        .map(|d| format!("{} ({})", d.symbol, d.reason))
        .collect();
    format!("; dropped: {}", parts.join(", "))
}
