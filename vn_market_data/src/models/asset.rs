use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad instrument family, used to pick a data source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    #[default]
    Stock,
    Forex,
    Crypto,
    Index,
}

#[derive(Debug, Error)]
#[error("Unknown asset category: {0}")]
pub struct UnknownCategoryError(pub String);

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Stock => "stock",
            AssetCategory::Forex => "forex",
            AssetCategory::Crypto => "crypto",
            AssetCategory::Index => "index",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = UnknownCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stock" | "equity" => Ok(AssetCategory::Stock),
            "forex" | "fx" => Ok(AssetCategory::Forex),
            "crypto" => Ok(AssetCategory::Crypto),
            "index" => Ok(AssetCategory::Index),
            _ => Err(UnknownCategoryError(s.to_string())),
        }
    }
}
