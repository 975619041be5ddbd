use async_trait::async_trait;
use reqwest::{Client, header};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::request_params::HistoryRequest,
    providers::{
        ApiSnafu, ClientBuildSnafu, FetchOutcome, InvalidHeaderSnafu, MalformedResponseSnafu,
        PriceSource, ProviderError, ProviderInitError, TransportSnafu, finish_rows,
        vci_rest::{
            params::{VciSettings, construct_payload},
            response::VciChartResponse,
        },
    },
};

pub struct VciProvider {
    client: Client,
    base_url: String,
}

impl VciProvider {
    /// Creates a new VCI provider.
    ///
    /// The chart endpoint is public; no credentials are read.
    pub fn new(settings: &VciSettings) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::REFERER,
            header::HeaderValue::from_str(&settings.referer).context(InvalidHeaderSnafu)?,
        );
        headers.insert(
            header::ORIGIN,
            header::HeaderValue::from_str(settings.referer.trim_end_matches('/'))
                .context(InvalidHeaderSnafu)?,
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&settings.user_agent).context(InvalidHeaderSnafu)?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }
}

#[async_trait]
impl PriceSource for VciProvider {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<FetchOutcome, ProviderError> {
        let payload = construct_payload(request);
        debug!(symbol = %request.symbol, count_back = payload.count_back, "requesting VCI chart");

        let response = self
            .client
            .post(&self.base_url)
            .json(&payload)
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
        // An unlisted ticker comes back as an empty body or `[]`.
        if body.trim().is_empty() {
            return Ok(FetchOutcome::NoData);
        }
        let series: VciChartResponse = serde_json::from_str(&body).map_err(|e| {
            MalformedResponseSnafu {
                message: e.to_string(),
            }
            .build()
        })?;

        let Some(series) = series
            .into_iter()
            .find(|s| s.symbol.is_empty() || s.symbol.eq_ignore_ascii_case(&request.symbol))
        else {
            return Ok(FetchOutcome::NoData);
        };

        let rows = series
            .into_rows()
            .map_err(|message| MalformedResponseSnafu { message }.build())?;
        finish_rows(request, rows)
    }
}
