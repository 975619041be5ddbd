use chrono::{Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Asia::Ho_Chi_Minh;
use serde::{Deserialize, Serialize};

use crate::models::request_params::HistoryRequest;

pub const DEFAULT_BASE_URL: &str = "https://trading.vietcap.com.vn/api/chart/OHLCChart/gap-chart";

/// Connection settings for the VCI chart endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VciSettings {
    pub base_url: String,
    /// Value sent as `Referer`/`Origin`; the endpoint rejects bare requests.
    pub referer: String,
    pub user_agent: String,
}

impl Default for VciSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: "https://trading.vietcap.com.vn/".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) vnprices/0.1".to_string(),
        }
    }
}

/// Bar resolution understood by the chart endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VciTimeFrame {
    OneDay,
}

/// JSON body of a chart request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VciChartRequest {
    pub time_frame: VciTimeFrame,
    pub symbols: Vec<String>,
    /// Exclusive upper bound, epoch seconds.
    pub to: i64,
    /// Number of bars to walk back from `to`.
    pub count_back: u32,
}

/// Builds the payload for a request. Coarser intervals are resampled from daily
/// bars, so the endpoint is always asked for `ONE_DAY`.
///
/// `count_back` counts calendar days, which over-covers trading days; the extra
/// bars are trimmed against the window afterwards.
pub fn construct_payload(request: &HistoryRequest) -> VciChartRequest {
    let span = (request.end - request.start).num_days().max(0) as u32;
    VciChartRequest {
        time_frame: VciTimeFrame::OneDay,
        symbols: vec![request.symbol.clone()],
        to: local_midnight_epoch(request.end + Duration::days(1)),
        count_back: span + 1,
    }
}

fn local_midnight_epoch(date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    Ho_Chi_Minh
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp())
}
