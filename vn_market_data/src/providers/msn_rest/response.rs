use serde::Deserialize;

use crate::models::bar::RawBar;

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MsnSeries {
    #[serde(default)]
    pub time_stamps: Vec<String>,
    #[serde(default)]
    pub open_prices: Vec<f64>,
    #[serde(default)]
    pub prices_high: Vec<f64>,
    #[serde(default)]
    pub prices_low: Vec<f64>,
    /// Closing prices.
    #[serde(default)]
    pub prices: Vec<f64>,
    /// Absent for forex pairs.
    #[serde(default)]
    pub volumes: Vec<f64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MsnChart {
    #[serde(default)]
    pub series: MsnSeries,
}

pub type MsnChartResponse = Vec<MsnChart>;

impl MsnSeries {
    pub fn into_rows(self) -> Result<Vec<RawBar>, String> {
        let n = self.time_stamps.len();
        let lengths = [
            self.open_prices.len(),
            self.prices_high.len(),
            self.prices_low.len(),
            self.prices.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(format!("array lengths differ: timeStamps={n}, o/h/l/c={lengths:?}"));
        }
        if !self.volumes.is_empty() && self.volumes.len() != n {
            return Err(format!("volumes has {} entries for {n} bars", self.volumes.len()));
        }

        Ok(self
            .time_stamps
            .into_iter()
            .enumerate()
            .map(|(i, time)| RawBar {
                time,
                open: self.open_prices[i],
                high: self.prices_high[i],
                low: self.prices_low[i],
                close: self.prices[i],
                volume: self.volumes.get(i).copied().unwrap_or(0.0),
            })
            .collect())
    }
}
