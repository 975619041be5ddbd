//! Parsing of vendor date fields into calendar dates.
//!
//! Instants that carry an offset (RFC 3339 strings, epoch seconds) are read in
//! exchange-local time, so a daily bar stamped `00:00 +07:00` stays on its own
//! trading day instead of slipping to the previous UTC date.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Asia::Ho_Chi_Minh;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable date value: {0:?}")]
pub struct BarTimeError(pub String);

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses a vendor time field into the exchange-local calendar date.
pub fn parse_bar_date(raw: &str) -> Result<NaiveDate, BarTimeError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(BarTimeError(raw.to_string()));
    }

    if value.bytes().all(|b| b.is_ascii_digit()) && value.len() > 8 {
        let secs: i64 = value.parse().map_err(|_| BarTimeError(raw.to_string()))?;
        return epoch_to_local_date(secs).ok_or_else(|| BarTimeError(raw.to_string()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Ho_Chi_Minh).date_naive());
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
        .ok_or_else(|| BarTimeError(raw.to_string()))
}

/// Converts epoch seconds to the exchange-local calendar date.
pub fn epoch_to_local_date(secs: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&Ho_Chi_Minh).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_plain_iso_date() {
        assert_eq!(parse_bar_date("2024-01-02").unwrap(), ymd(2024, 1, 2));
        assert_eq!(parse_bar_date(" 2024-01-02 ").unwrap(), ymd(2024, 1, 2));
    }

    #[test]
    fn parses_naive_datetimes() {
        assert_eq!(parse_bar_date("2024-01-02 00:00:00").unwrap(), ymd(2024, 1, 2));
        assert_eq!(parse_bar_date("2024-01-02T00:00:00.000").unwrap(), ymd(2024, 1, 2));
        assert_eq!(parse_bar_date("2024-01-02T09:15").unwrap(), ymd(2024, 1, 2));
    }

    #[test]
    fn offset_instants_use_exchange_local_date() {
        // 17:00 UTC on Jan 1 is midnight Jan 2 in Ho Chi Minh City.
        assert_eq!(parse_bar_date("2024-01-01T17:00:00Z").unwrap(), ymd(2024, 1, 2));
        assert_eq!(parse_bar_date("2024-01-02T00:00:00+07:00").unwrap(), ymd(2024, 1, 2));
    }

    #[test]
    fn parses_epoch_seconds_in_local_time() {
        // 2024-01-02T00:00:00+07:00
        assert_eq!(parse_bar_date("1704128400").unwrap(), ymd(2024, 1, 2));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_bar_date("").is_err());
        assert!(parse_bar_date("yesterday").is_err());
        assert!(parse_bar_date("2024-13-45").is_err());
        assert!(parse_bar_date("20240102").is_err());
    }
}
