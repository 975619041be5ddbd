//! Fetch, align and optimize: the portfolio pipeline behind `vnprices`.
//!
//! A run is one linear pass. Every requested symbol is fetched concurrently
//! through a [`vn_market_data::providers::PriceSource`], each raw table is
//! normalized to a dated close series, the series are aligned into a
//! [`series::PriceMatrix`] with no missing cells, and the matrix is handed to
//! the estimators and the constrained solver. Per-symbol failures are
//! collected as diagnostics; only whole-batch failures surface as
//! [`errors::PipelineError`].

pub mod align;
pub mod config;
pub mod errors;
pub mod estimators;
pub mod fetch;
pub mod normalize;
pub mod optimizer;
pub mod report;
pub mod series;
pub mod service;
pub mod solver;
