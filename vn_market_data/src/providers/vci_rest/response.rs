use serde::Deserialize;

use crate::models::bar::RawBar;

/// Epoch timestamps arrive as strings on some deployments and numbers on others.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum VciEpoch {
    Text(String),
    Number(i64),
}

impl VciEpoch {
    fn as_time_field(&self) -> String {
        match self {
            VciEpoch::Text(s) => s.trim().to_string(),
            VciEpoch::Number(n) => n.to_string(),
        }
    }
}

/// One symbol's chart data: parallel arrays, one entry per bar.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct VciChartSeries {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub o: Vec<f64>,
    #[serde(default)]
    pub h: Vec<f64>,
    #[serde(default)]
    pub l: Vec<f64>,
    #[serde(default)]
    pub c: Vec<f64>,
    #[serde(default)]
    pub v: Vec<f64>,
    #[serde(default)]
    pub t: Vec<VciEpoch>,
}

pub type VciChartResponse = Vec<VciChartSeries>;

impl VciChartSeries {
    /// Zips the parallel arrays into rows. Arrays of unequal length mean the
    /// payload is corrupt; that is reported instead of silently truncating.
    pub fn into_rows(self) -> Result<Vec<RawBar>, String> {
        let n = self.t.len();
        let lengths = [self.o.len(), self.h.len(), self.l.len(), self.c.len(), self.v.len()];
        if lengths.iter().any(|&len| len != n) {
            return Err(format!(
                "array lengths differ for {}: t={n}, o/h/l/c/v={lengths:?}",
                self.symbol
            ));
        }

        Ok((0..n)
            .map(|i| RawBar {
                time: self.t[i].as_time_field(),
                open: self.o[i],
                high: self.h[i],
                low: self.l[i],
                close: self.c[i],
                volume: self.v[i],
            })
            .collect())
    }
}
