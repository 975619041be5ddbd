//! Typed tables that flow between the pipeline stages.

use chrono::NaiveDate;
use nalgebra::DMatrix;
use serde::Serialize;

use crate::errors::PipelineError;

/// Inclusive calendar window of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidRequest(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Close prices of one symbol, keyed by strictly increasing dates.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSeries {
    symbol: String,
    points: Vec<(NaiveDate, f64)>,
}

impl SymbolSeries {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            points: Vec::new(),
        }
    }

    /// Sorts by date; for repeated dates the last point wins.
    pub fn from_points(symbol: impl Into<String>, mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.sort_by_key(|(date, _)| *date);
        let mut deduped: Vec<(NaiveDate, f64)> = Vec::with_capacity(points.len());
        for (date, close) in points {
            match deduped.last_mut() {
                Some(last) if last.0 == date => last.1 = close,
                _ => deduped.push((date, close)),
            }
        }
        Self {
            symbol: symbol.into(),
            points: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|(date, _)| *date)
    }

    /// Binary search on the sorted dates.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .map(|i| self.points[i].1)
    }

    /// Keeps only the points inside `window`.
    pub fn restrict(&self, window: DateWindow) -> Self {
        Self {
            symbol: self.symbol.clone(),
            points: self
                .points
                .iter()
                .copied()
                .filter(|(date, _)| window.contains(*date))
                .collect(),
        }
    }
}

/// Date × symbol matrix of close prices with no missing cells.
///
/// Rows are in ascending date order, columns in the caller's symbol order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    prices: DMatrix<f64>,
}

impl PriceMatrix {
    pub(crate) fn new(symbols: Vec<String>, dates: Vec<NaiveDate>, prices: DMatrix<f64>) -> Self {
        debug_assert_eq!(prices.nrows(), dates.len());
        debug_assert_eq!(prices.ncols(), symbols.len());
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        Self {
            symbols,
            dates,
            prices,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn prices(&self) -> &DMatrix<f64> {
        &self.prices
    }

    pub fn n_observations(&self) -> usize {
        self.dates.len()
    }

    pub fn n_assets(&self) -> usize {
        self.symbols.len()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Simple period returns `p[t] / p[t-1] - 1`, one row fewer than the prices.
    pub fn returns(&self) -> DMatrix<f64> {
        let n = self.prices.nrows();
        if n < 2 {
            return DMatrix::zeros(0, self.prices.ncols());
        }
        DMatrix::from_fn(n - 1, self.prices.ncols(), |t, j| {
            self.prices[(t + 1, j)] / self.prices[(t, j)] - 1.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn from_points_sorts_and_keeps_last_duplicate() {
        let series = SymbolSeries::from_points("FPT", vec![(d(3), 3.0), (d(2), 2.0), (d(3), 3.5)]);
        assert_eq!(series.points(), &[(d(2), 2.0), (d(3), 3.5)]);
        assert_eq!(series.close_on(d(3)), Some(3.5));
        assert_eq!(series.close_on(d(4)), None);
    }

    #[test]
    fn restrict_is_inclusive() {
        let series = SymbolSeries::from_points("FPT", (1..=5).map(|i| (d(i), i as f64)).collect());
        let window = DateWindow::new(d(2), d(4)).unwrap();
        let dates: Vec<_> = series.restrict(window).dates().collect();
        assert_eq!(dates, vec![d(2), d(3), d(4)]);
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(matches!(
            DateWindow::new(d(5), d(1)),
            Err(PipelineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn returns_are_row_to_row() {
        let m = PriceMatrix::new(
            vec!["A".into(), "B".into()],
            vec![d(2), d(3), d(4)],
            DMatrix::from_row_slice(3, 2, &[100.0, 10.0, 110.0, 10.0, 99.0, 12.0]),
        );
        let r = m.returns();
        assert_eq!(r.shape(), (2, 2));
        assert!((r[(0, 0)] - 0.1).abs() < 1e-12);
        assert!((r[(1, 0)] + 0.1).abs() < 1e-12);
        assert!((r[(1, 1)] - 0.2).abs() < 1e-12);
    }
}
