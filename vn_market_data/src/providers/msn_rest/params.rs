use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::request_params::HistoryRequest;

pub const DEFAULT_BASE_URL: &str = "https://assets.msn.com/service/Finance/Charts/TimeRange";

/// Environment variable holding the MSN API key.
pub const API_KEY_ENV: &str = "MSN_API_KEY";

/// Connection settings and the canonical-to-remote symbol map for MSN.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MsnSettings {
    pub base_url: String,
    /// Canonical ticker (upper-case) -> MSN instrument id.
    ///
    /// Configured entries are merged over the built-in map.
    #[serde(deserialize_with = "merge_over_default_symbols")]
    pub symbol_map: IndexMap<String, String>,
}

impl Default for MsnSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            symbol_map: default_symbol_map(),
        }
    }
}

fn merge_over_default_symbols<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<IndexMap<String, String>, D::Error> {
    let configured = IndexMap::<String, String>::deserialize(deserializer)?;
    let mut map = default_symbol_map();
    for (symbol, remote) in configured {
        map.insert(symbol.trim().to_uppercase(), remote.trim().to_string());
    }
    Ok(map)
}

fn default_symbol_map() -> IndexMap<String, String> {
    [
        // forex
        ("USDVND", "avyufr"),
        ("JPYVND", "ave8sm"),
        ("EURVND", "av93ec"),
        ("CNYVND", "av55fr"),
        ("EURUSD", "av932w"),
        ("USDJPY", "avyomw"),
        ("GBPUSD", "avyjhw"),
        // crypto
        ("BTC", "c2111"),
        ("ETH", "c2112"),
        ("USDT", "c2115"),
        ("BNB", "c2113"),
        // world indices
        ("DJI", "a6qja2"),
        ("INX", "a33k6h"),
        ("COMP", "a3oxnm"),
        ("N225", "a9j7bh"),
        ("HSI", "aqk2nm"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl MsnSettings {
    /// Looks up the MSN id, accepting a few common spellings of the same ticker.
    pub fn remote_id(&self, symbol: &str) -> Option<&str> {
        let canonical = symbol.trim().to_uppercase();
        let alias = match canonical.as_str() {
            "SP500" | "SPX" | "S&P500" => "INX",
            "NASDAQ" | "IXIC" => "COMP",
            other => other,
        };
        self.symbol_map
            .get(alias)
            .or_else(|| self.symbol_map.get(&canonical.replace(['/', '-'], "")))
            .map(String::as_str)
    }
}

/// Query string for the time-range endpoint (API key excluded).
pub fn construct_params(request: &HistoryRequest, remote_id: &str) -> Vec<(String, String)> {
    // The endpoint expects UTC instants bracketing Vietnam-local days.
    let start = request.start - Duration::days(1);
    let end = request.end;
    vec![
        ("StartTime".to_string(), format!("{}T17:00:00.000Z", iso(start))),
        ("EndTime".to_string(), format!("{}T16:59:00.000Z", iso(end))),
        ("timeframe".to_string(), "1".to_string()),
        ("ocid".to_string(), "finance-utils-peregrine".to_string()),
        ("cm".to_string(), "vi-vn".to_string()),
        ("it".to_string(), "web".to_string()),
        ("scn".to_string(), "ANON".to_string()),
        ("ids".to_string(), remote_id.to_string()),
        ("type".to_string(), "All".to_string()),
        ("wrapodata".to_string(), "false".to_string()),
        ("disableSymbol".to_string(), "false".to_string()),
    ]
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
