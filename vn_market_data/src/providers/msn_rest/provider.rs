use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::request_params::HistoryRequest,
    providers::{
        ApiSnafu, ClientBuildSnafu, FetchOutcome, MalformedResponseSnafu, MissingEnvVarSnafu,
        PriceSource, ProviderError, ProviderId, ProviderInitError, TransportSnafu,
        UnknownSymbolSnafu, finish_rows,
        msn_rest::{
            params::{API_KEY_ENV, MsnSettings, construct_params},
            response::MsnChartResponse,
        },
    },
};

pub struct MsnProvider {
    client: Client,
    api_key: SecretString,
    settings: MsnSettings,
}

impl MsnProvider {
    /// Creates a new MSN provider.
    ///
    /// Reads the API key from the `MSN_API_KEY` environment variable.
    pub fn new(settings: &MsnSettings) -> Result<Self, ProviderInitError> {
        let api_key = SecretString::from(get_env_var(API_KEY_ENV).context(MissingEnvVarSnafu)?);
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: &MsnSettings, api_key: SecretString) -> Result<Self, ProviderInitError> {
        let client = Client::builder().build().context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            api_key,
            settings: settings.clone(),
        })
    }
}

#[async_trait]
impl PriceSource for MsnProvider {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<FetchOutcome, ProviderError> {
        let Some(remote_id) = self.settings.remote_id(&request.symbol) else {
            return UnknownSymbolSnafu {
                provider: ProviderId::Msn,
                symbol: request.symbol.clone(),
            }
            .fail();
        };
        debug!(symbol = %request.symbol, remote_id, "requesting MSN chart");

        let mut query = construct_params(request, remote_id);
        query.push(("apikey".to_string(), self.api_key.expose_secret().to_string()));

        let response = self
            .client
            .get(&self.settings.base_url)
            .query(&query)
            .send()
            .await
            .context(TransportSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu {
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        let body = response.text().await.context(TransportSnafu)?;
        let charts: MsnChartResponse = serde_json::from_str(&body).map_err(|e| {
            MalformedResponseSnafu {
                message: e.to_string(),
            }
            .build()
        })?;
        let Some(chart) = charts.into_iter().next() else {
            return Ok(FetchOutcome::NoData);
        };

        let rows = chart
            .series
            .into_rows()
            .map_err(|message| MalformedResponseSnafu { message }.build())?;
        finish_rows(request, rows)
    }
}
