//! Aggregation of daily bars into weekly or monthly bars.
//!
//! Both upstream sources are queried at daily resolution; coarser intervals are
//! built here. A bucket is an ISO week or a calendar month. The aggregated bar
//! is stamped with the last trading date that fell inside the bucket.

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;

use crate::models::{
    bar::RawBar,
    bar_time::{BarTimeError, parse_bar_date},
    interval::BarInterval,
};

/// Resamples `rows` to `interval`. Daily input is returned untouched.
pub fn resample(rows: Vec<RawBar>, interval: BarInterval) -> Result<Vec<RawBar>, BarTimeError> {
    if interval == BarInterval::Daily {
        return Ok(rows);
    }

    let mut dated = rows
        .into_iter()
        .map(|row| parse_bar_date(&row.time).map(|date| (date, row)))
        .collect::<Result<Vec<_>, _>>()?;
    dated.sort_by_key(|(date, _)| *date);

    let mut buckets: IndexMap<(i32, u32), Vec<(NaiveDate, RawBar)>> = IndexMap::new();
    for (date, row) in dated {
        buckets.entry(bucket_key(date, interval)).or_default().push((date, row));
    }

    Ok(buckets.into_values().filter_map(aggregate).collect())
}

fn bucket_key(date: NaiveDate, interval: BarInterval) -> (i32, u32) {
    match interval {
        BarInterval::Weekly => {
            let week = date.iso_week();
            (week.year(), week.week())
        }
        BarInterval::Monthly => (date.year(), date.month()),
        BarInterval::Daily => (date.year(), date.ordinal()),
    }
}

fn aggregate(bucket: Vec<(NaiveDate, RawBar)>) -> Option<RawBar> {
    let (_, first) = bucket.first()?;
    let (last_date, last) = bucket.last()?;

    let high = bucket.iter().map(|(_, r)| r.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bucket.iter().map(|(_, r)| r.low).fold(f64::INFINITY, f64::min);
    let volume = bucket.iter().map(|(_, r)| r.volume).sum();

    Some(RawBar {
        time: last_date.format("%Y-%m-%d").to_string(),
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    })
}
