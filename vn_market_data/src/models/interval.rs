//! Bar sampling intervals.
//!
//! Only calendar-resolution intervals are modelled: every bar is keyed by a
//! trading date. Codes follow the vendor convention (`"1D"`, `"1W"`, `"1M"`).
//!
//! ```
//! use vn_market_data::models::interval::BarInterval;
//!
//! let iv: BarInterval = "1W".parse().unwrap();
//! assert_eq!(iv, BarInterval::Weekly);
//! assert_eq!(iv.to_string(), "1W");
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntervalError {
    #[error("Invalid interval: {0:?} (expected 1D, 1W or 1M)")]
    InvalidInput(String),
}

/// Sampling period of a price observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BarInterval {
    #[default]
    Daily,
    /// ISO weeks (Monday based).
    Weekly,
    /// Calendar months.
    Monthly,
}

impl BarInterval {
    pub const fn code(&self) -> &'static str {
        match self {
            BarInterval::Daily => "1D",
            BarInterval::Weekly => "1W",
            BarInterval::Monthly => "1M",
        }
    }

    /// Number of bars in a year at this interval, used for annualization.
    pub const fn periods_per_year(&self) -> u32 {
        match self {
            BarInterval::Daily => 252,
            BarInterval::Weekly => 52,
            BarInterval::Monthly => 12,
        }
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BarInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "1M" is monthly here; there is no minute resolution to collide with.
        match s.trim().to_lowercase().as_str() {
            "1d" | "d" | "day" | "daily" => Ok(BarInterval::Daily),
            "1w" | "w" | "week" | "weekly" => Ok(BarInterval::Weekly),
            "1m" | "m" | "month" | "monthly" => Ok(BarInterval::Monthly),
            _ => Err(IntervalError::InvalidInput(s.to_string())),
        }
    }
}

impl Serialize for BarInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for BarInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_aliases() {
        assert_eq!("1D".parse::<BarInterval>().unwrap(), BarInterval::Daily);
        assert_eq!("daily".parse::<BarInterval>().unwrap(), BarInterval::Daily);
        assert_eq!(" 1w ".parse::<BarInterval>().unwrap(), BarInterval::Weekly);
        assert_eq!("1M".parse::<BarInterval>().unwrap(), BarInterval::Monthly);
        assert_eq!("month".parse::<BarInterval>().unwrap(), BarInterval::Monthly);
    }

    #[test]
    fn rejects_unknown_codes() {
        assert!("5m".parse::<BarInterval>().is_err());
        assert!("".parse::<BarInterval>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for iv in [BarInterval::Daily, BarInterval::Weekly, BarInterval::Monthly] {
            assert_eq!(iv.to_string().parse::<BarInterval>().unwrap(), iv);
        }
    }
}
