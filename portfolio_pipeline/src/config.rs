//! Runtime configuration.
//!
//! Settings come from an optional TOML file, then a small set of environment
//! overrides. Every section has defaults, so an empty file (or no file) is a
//! valid configuration. Secrets are never read from the file.
//!
//! `estimation.frequency` follows `fetch.interval` when left unset; an explicit
//! value has to agree with the interval.
//!
//! ```toml
//! [fetch]
//! timeout_secs = 20
//! interval = "1D"
//!
//! [estimation]
//! ema_span = 500
//!
//! [optimizer]
//! risk_free_rate = 0.03
//!
//! [sources.msn.symbol_map]
//! USDVND = "avyufr"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use shared_utils::env::{InvalidEnvVarError, parse_env_var};
use thiserror::Error;
use tracing::info;
use vn_market_data::{models::interval::BarInterval, providers::SourceSettings};

use crate::{
    estimators::EstimatorSettings, optimizer::WeightCleaning, solver::ProjectedGradientSolver,
};

pub const ENV_FETCH_TIMEOUT_SECS: &str = "VNPRICES_FETCH_TIMEOUT_SECS";
pub const ENV_RISK_FREE_RATE: &str = "VNPRICES_RISK_FREE_RATE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Env(#[from] InvalidEnvVarError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// Per-symbol fetch timeout.
    pub timeout_secs: u64,
    pub interval: BarInterval,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            interval: BarInterval::Daily,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerSettings {
    pub risk_free_rate: f64,
    pub risk_aversion: f64,
    pub weight_cutoff: f64,
    pub rounding: Option<u32>,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        let cleaning = WeightCleaning::default();
        let solver = ProjectedGradientSolver::default();
        Self {
            risk_free_rate: 0.02,
            risk_aversion: 1.0,
            weight_cutoff: cleaning.cutoff,
            rounding: cleaning.rounding,
            max_iterations: solver.max_iterations,
            tolerance: solver.tolerance,
        }
    }
}

impl OptimizerSettings {
    pub fn cleaning(&self) -> WeightCleaning {
        WeightCleaning {
            cutoff: self.weight_cutoff,
            rounding: self.rounding,
        }
    }

    pub fn solver(&self) -> ProjectedGradientSolver {
        ProjectedGradientSolver {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub fetch: FetchSettings,
    pub estimation: EstimatorSettings,
    pub optimizer: OptimizerSettings,
    pub sources: SourceSettings,
}

impl AppConfig {
    /// Parses a TOML document without applying environment overrides.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(s)?;
        config.derive_frequency();
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(path = %path.display(), "loaded config file");
                toml::from_str(&text)?
            }
            None => AppConfig::default(),
        };
        config.apply_env_overrides()?;
        config.derive_frequency();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(secs) = parse_env_var::<u64>(ENV_FETCH_TIMEOUT_SECS)? {
            self.fetch.timeout_secs = secs;
        }
        if let Some(rate) = parse_env_var::<f64>(ENV_RISK_FREE_RATE)? {
            self.optimizer.risk_free_rate = rate;
        }
        Ok(())
    }

    /// Annualizes at the bar interval's rate unless a frequency was given.
    pub fn derive_frequency(&mut self) {
        self.estimation
            .frequency
            .get_or_insert(self.fetch.interval.periods_per_year());
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be positive".into()));
        }
        let expected = self.fetch.interval.periods_per_year();
        if let Some(frequency) = self.estimation.frequency
            && frequency != expected
        {
            return Err(ConfigError::Invalid(format!(
                "estimation.frequency = {frequency} does not match fetch.interval {} ({expected} bars a year)",
                self.fetch.interval
            )));
        }
        if self.estimation.ema_span == 0 || self.estimation.cov_span == 0 {
            return Err(ConfigError::Invalid("estimation spans must be positive".into()));
        }
        let opt = &self.optimizer;
        if !opt.risk_free_rate.is_finite() {
            return Err(ConfigError::Invalid("optimizer.risk_free_rate must be finite".into()));
        }
        if !opt.risk_aversion.is_finite() || opt.risk_aversion <= 0.0 {
            return Err(ConfigError::Invalid("optimizer.risk_aversion must be positive".into()));
        }
        let cutoff_ok = opt.weight_cutoff.is_finite() && opt.weight_cutoff >= 0.0;
        let tolerance_ok = opt.tolerance.is_finite() && opt.tolerance > 0.0;
        if !cutoff_ok || !tolerance_ok || opt.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "optimizer.weight_cutoff, tolerance and max_iterations must be positive".into(),
            ));
        }
        Ok(())
    }
}
