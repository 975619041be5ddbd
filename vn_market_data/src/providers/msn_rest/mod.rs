//! MSN Money chart API: forex pairs, crypto assets and world indices.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::MsnProvider;
