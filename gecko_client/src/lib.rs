// CoinGecko price client: one batched quote request per run plus a
// free-text search used for price id resolution.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snapshot_core::{AssetHit, FiatQuote, PriceOracle, SnapshotError};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// The fixed fiat pair every quote is requested in.
const VS_CURRENCIES: &str = "usd,krw";

#[derive(Error, Debug)]
pub enum GeckoClientError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("price API error {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeckoClientConfig {
    /// Price oracle base URL
    pub api_url: String,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for GeckoClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

/// Raw `/simple/price` shape: asset id -> currency code -> price.
type RawPriceResponse = HashMap<String, HashMap<String, Decimal>>;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    symbol: String,
}

#[derive(Clone)]
pub struct GeckoPriceClient {
    config: GeckoClientConfig,
    http_client: Client,
}

impl GeckoPriceClient {
    pub fn new(config: GeckoClientConfig) -> Result<Self, GeckoClientError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Fetch USD/KRW quotes for every id in a single batched request.
    ///
    /// The result always contains one entry per requested id; ids the
    /// upstream response omits are filled with a zero quote so callers can
    /// index unconditionally. Stateless: nothing is cached between calls.
    pub async fn simple_prices(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, FiatQuote>, GeckoClientError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/simple/price", self.config.api_url);
        let ids_param = ids.join(",");
        debug!("fetching {} quotes in one batch", ids.len());

        let response = self
            .http_client
            .get(&url)
            .query(&[("ids", ids_param.as_str()), ("vs_currencies", VS_CURRENCIES)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeckoClientError::Api { status, body });
        }

        let raw: RawPriceResponse = response.json().await?;
        Ok(fill_quotes(ids, &raw))
    }

    /// Free-text asset search; returns candidate id/symbol pairs.
    pub async fn search_assets(&self, query: &str) -> Result<Vec<AssetHit>, GeckoClientError> {
        let url = format!("{}/search", self.config.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeckoClientError::Api { status, body });
        }

        let search: SearchResponse = response.json().await?;
        Ok(search
            .coins
            .into_iter()
            .map(|coin| AssetHit {
                id: coin.id,
                symbol: coin.symbol,
            })
            .collect())
    }
}

/// Project the raw response onto the requested id set, zero-filling ids the
/// upstream left out and currencies it did not quote.
fn fill_quotes(ids: &[String], raw: &RawPriceResponse) -> HashMap<String, FiatQuote> {
    let mut quotes = HashMap::with_capacity(ids.len());

    for id in ids {
        let quote = match raw.get(id) {
            Some(entry) => FiatQuote {
                usd: entry.get("usd").copied().unwrap_or(Decimal::ZERO),
                krw: entry.get("krw").copied().unwrap_or(Decimal::ZERO),
            },
            None => {
                warn!("no quote for {}, defaulting to zero", id);
                FiatQuote::ZERO
            }
        };
        quotes.insert(id.clone(), quote);
    }

    quotes
}

#[async_trait]
impl PriceOracle for GeckoPriceClient {
    async fn prices(
        &self,
        ids: &[String],
    ) -> snapshot_core::Result<HashMap<String, FiatQuote>> {
        self.simple_prices(ids)
            .await
            .map_err(|e| SnapshotError::PriceOracle(e.to_string()))
    }

    async fn search(&self, query: &str) -> snapshot_core::Result<Vec<AssetHit>> {
        self.search_assets(query)
            .await
            .map_err(|e| SnapshotError::PriceOracle(e.to_string()))
    }
}
