//! Chooses the upstream source for each request.
//!
//! Vietnamese equities and the three domestic exchange indices come from VCI.
//! Everything else (forex pairs, crypto assets, world indices) goes to MSN.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    models::{asset::AssetCategory, request_params::HistoryRequest},
    providers::{
        FetchOutcome, PriceSource, ProviderError, ProviderId, SourceSettings, UnavailableSnafu,
        msn_rest::MsnProvider, vci_rest::VciProvider,
    },
};

/// Exchange indices served by the domestic chart API.
pub const VN_INDICES: [&str; 3] = ["VNINDEX", "HNXINDEX", "UPCOMINDEX"];

/// Picks the source for a symbol of the given category.
pub fn route(category: AssetCategory, symbol: &str) -> ProviderId {
    match category {
        AssetCategory::Stock => ProviderId::Vci,
        AssetCategory::Index if VN_INDICES.contains(&symbol.trim().to_uppercase().as_str()) => {
            ProviderId::Vci
        }
        AssetCategory::Index | AssetCategory::Forex | AssetCategory::Crypto => ProviderId::Msn,
    }
}

type Slot = Result<Arc<dyn PriceSource>, String>;

/// A [`PriceSource`] that dispatches each request to the routed provider.
///
/// A provider that failed to initialise does not fail the registry; requests
/// routed to it fail individually with [`ProviderError::Unavailable`].
pub struct SourceRegistry {
    vci: Slot,
    msn: Slot,
}

impl SourceRegistry {
    /// Builds both providers from configuration.
    pub fn from_settings(settings: &SourceSettings) -> Self {
        let vci = VciProvider::new(&settings.vci)
            .map(|p| Arc::new(p) as Arc<dyn PriceSource>)
            .map_err(|e| {
                warn!(error = %e, "VCI source disabled");
                e.to_string()
            });
        let msn = MsnProvider::new(&settings.msn)
            .map(|p| Arc::new(p) as Arc<dyn PriceSource>)
            .map_err(|e| {
                warn!(error = %e, "MSN source disabled");
                e.to_string()
            });
        Self { vci, msn }
    }

    /// Uses caller-supplied sources, mostly for tests.
    pub fn with_sources(vci: Arc<dyn PriceSource>, msn: Arc<dyn PriceSource>) -> Self {
        Self {
            vci: Ok(vci),
            msn: Ok(msn),
        }
    }

    fn slot(&self, provider: ProviderId) -> &Slot {
        match provider {
            ProviderId::Vci => &self.vci,
            ProviderId::Msn => &self.msn,
        }
    }
}

#[async_trait]
impl PriceSource for SourceRegistry {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<FetchOutcome, ProviderError> {
        let provider = route(request.category, &request.symbol);
        match self.slot(provider) {
            Ok(source) => source.fetch_history(request).await,
            Err(message) => UnavailableSnafu {
                provider,
                message: message.clone(),
            }
            .fail(),
        }
    }
}
