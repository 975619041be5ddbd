//! VCI (Vietcap) chart API: domestic equities and the VN, HNX and UPCoM indices.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::VciProvider;
