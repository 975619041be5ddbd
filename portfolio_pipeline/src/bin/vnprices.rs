use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use portfolio_pipeline::{
    config::AppConfig,
    errors::PipelineError,
    estimators::{ReturnsMethod, RiskMethod},
    optimizer::ObjectiveKind,
    report::{ErrorReport, to_pretty_json},
    service::{AllocationQuery, PortfolioService},
    solver::WeightBounds,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use vn_market_data::{
    history::history_text,
    models::{asset::AssetCategory, interval::BarInterval},
    providers::routing::SourceRegistry,
};

#[derive(Parser)]
#[command(version, about = "Vietnamese market prices and portfolio optimization")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Annualized expected return per symbol.
    Returns {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value = "mean_historical_return")]
        method: ReturnsMethod,
    },
    /// Weights for a single objective.
    Optimize {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value = "max_sharpe")]
        objective: ObjectiveKind,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Max Sharpe, min volatility and max utility side by side.
    Full {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long)]
        risk_aversion: Option<f64>,
    },
    /// Raw bars for one instrument.
    History {
        #[arg(long, default_value = "stock")]
        category: AssetCategory,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "1D")]
        interval: BarInterval,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// Comma separated tickers, e.g. `FPT,VNM,HPG`.
    #[arg(long, value_delimiter = ',', required = true)]
    symbols: Vec<String>,
    #[arg(long)]
    start: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
}

#[derive(Args)]
struct ModelArgs {
    #[arg(long)]
    risk_free_rate: Option<f64>,
    #[arg(long, default_value = "mean_historical_return")]
    returns_method: ReturnsMethod,
    #[arg(long, default_value = "sample_cov")]
    risk_method: RiskMethod,
    #[arg(long, default_value_t = 0.0)]
    min_weight: f64,
    #[arg(long, default_value_t = 1.0)]
    max_weight: f64,
}

impl ModelArgs {
    fn query(&self, range: RangeArgs, objective: ObjectiveKind) -> Result<AllocationQuery, PipelineError> {
        let bounds = WeightBounds::new(self.min_weight, self.max_weight).ok_or_else(|| {
            PipelineError::InvalidRequest(format!(
                "weight bounds [{}, {}] are not a valid range",
                self.min_weight, self.max_weight
            ))
        })?;
        Ok(AllocationQuery {
            objective,
            risk_free_rate: self.risk_free_rate,
            returns_method: self.returns_method,
            risk_method: self.risk_method,
            bounds,
            ..AllocationQuery::new(range.symbols, range.start, range.end)
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vnprices=info,portfolio_pipeline=info,vn_market_data=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the report, or the error as JSON with a failing exit code.
fn emit<T: Serialize>(result: Result<T, PipelineError>) -> Result<ExitCode> {
    match result {
        Ok(report) => {
            println!("{}", to_pretty_json(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "request failed");
            println!("{}", to_pretty_json(&ErrorReport::from(&e))?);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let registry = SourceRegistry::from_settings(&config.sources);

    match cli.cmd {
        Cmd::History {
            category,
            symbol,
            start,
            end,
            interval,
        } => {
            println!("{}", history_text(&registry, category, &symbol, start, end, interval).await);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Returns { range, method } => {
            let service = PortfolioService::new(config, registry);
            emit(
                service
                    .expected_returns(&range.symbols, range.start, range.end, method)
                    .await,
            )
        }
        Cmd::Optimize {
            range,
            objective,
            model,
        } => {
            let service = PortfolioService::new(config, registry);
            let result = match model.query(range, objective) {
                Ok(query) => service.optimize_allocation(&query).await,
                Err(e) => Err(e),
            };
            emit(result)
        }
        Cmd::Full {
            range,
            model,
            risk_aversion,
        } => {
            let service = PortfolioService::new(config, registry);
            let result = match model.query(range, ObjectiveKind::MaxSharpe) {
                Ok(query) => {
                    let query = AllocationQuery {
                        risk_aversion,
                        ..query
                    };
                    service.full_optimization(&query).await
                }
                Err(e) => Err(e),
            };
            emit(result)
        }
    }
}
