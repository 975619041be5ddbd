//! Vietnamese market data access.
//!
//! Price bars for equities, indices, forex pairs and crypto assets are fetched
//! through the [`providers::PriceSource`] trait. Concrete sources (VCI for the
//! domestic exchanges, MSN for everything else) are selected per call by
//! [`providers::routing::route`].

pub mod history;
pub mod models;
pub mod providers;
pub mod resample;
