//! Provider abstraction for market data sources.
//!
//! This module defines the [`PriceSource`] trait, the single interface through
//! which every vendor (VCI, MSN) is queried for one symbol's price history.
//!
//! "No bars in the requested window" is a normal answer, reported as
//! [`FetchOutcome::NoData`]. Only genuine failures (transport, vendor error
//! responses, payloads that cannot be decoded) are [`ProviderError`]s.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use vn_market_data::models::request_params::HistoryRequest;
//! use vn_market_data::providers::{FetchOutcome, PriceSource, ProviderError};
//!
//! struct EmptySource;
//!
//! #[async_trait]
//! impl PriceSource for EmptySource {
//!     async fn fetch_history(
//!         &self,
//!         _request: &HistoryRequest,
//!     ) -> Result<FetchOutcome, ProviderError> {
//!         Ok(FetchOutcome::NoData)
//!     }
//! }
//! ```

pub mod msn_rest;
pub mod routing;
pub mod vci_rest;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::{
    models::{
        bar::{RawBar, RawPriceTable},
        bar_time::parse_bar_date,
        request_params::HistoryRequest,
    },
    resample::resample,
};

/// Result of a successful provider round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// At least one bar inside the requested window.
    Data(RawPriceTable),
    /// The vendor answered, but has nothing for this symbol and window.
    NoData,
}

impl FetchOutcome {
    pub fn into_table(self) -> Option<RawPriceTable> {
        match self {
            FetchOutcome::Data(table) => Some(table),
            FetchOutcome::NoData => None,
        }
    }
}

/// Trait for fetching one symbol's price history from a market data vendor.
///
/// Implementations must be cheap to share across concurrent fetches; they are
/// called through `&self` from many tasks at once.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<FetchOutcome, ProviderError>;
}

#[async_trait]
impl<T: PriceSource + ?Sized> PriceSource for Box<T> {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<FetchOutcome, ProviderError> {
        (**self).fetch_history(request).await
    }
}

#[async_trait]
impl<T: PriceSource + ?Sized> PriceSource for std::sync::Arc<T> {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<FetchOutcome, ProviderError> {
        (**self).fetch_history(request).await
    }
}

/// Identifies a concrete upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Vci,
    Msn,
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Vci => f.write_str("VCI"),
            ProviderId::Msn => f.write_str("MSN"),
        }
    }
}

/// Connection settings for every upstream source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub vci: vci_rest::params::VciSettings,
    pub msn: msn_rest::params::MsnSettings,
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// A configured header value contains invalid characters.
    #[snafu(display("Invalid header value: {source}"))]
    InvalidHeader {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a [`PriceSource`] implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during the HTTP exchange (connect failure, timeout, bad body).
    #[snafu(display("API request failed: {source}"))]
    Transport {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The vendor answered with a non-success status.
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The payload could not be turned into price rows.
    #[snafu(display("Malformed response: {message}"))]
    MalformedResponse {
        message: String,
        backtrace: Backtrace,
    },

    /// The source has no identifier for this symbol.
    #[snafu(display("Unknown symbol for {provider}: {symbol}"))]
    UnknownSymbol {
        provider: ProviderId,
        symbol: String,
        backtrace: Backtrace,
    },

    /// The routed source could not be constructed for this run.
    #[snafu(display("{provider} source unavailable: {message}"))]
    Unavailable {
        provider: ProviderId,
        message: String,
        backtrace: Backtrace,
    },
}

/// Shared post-processing for daily vendor rows: keep the request window,
/// resample to the requested interval, and map an empty result to `NoData`.
///
/// Rows whose time field cannot be parsed are kept for daily requests so the
/// caller's normalizer can report them; coarser intervals need every date.
pub(crate) fn finish_rows(request: &HistoryRequest, rows: Vec<RawBar>) -> Result<FetchOutcome, ProviderError> {
    let in_window: Vec<RawBar> = rows
        .into_iter()
        .filter(|row| parse_bar_date(&row.time).map_or(true, |date| request.contains(date)))
        .collect();

    let rows = resample(in_window, request.interval).map_err(|e| {
        MalformedResponseSnafu {
            message: e.to_string(),
        }
        .build()
    })?;

    if rows.is_empty() {
        Ok(FetchOutcome::NoData)
    } else {
        Ok(FetchOutcome::Data(RawPriceTable::new(request.symbol.clone(), rows)))
    }
}
