// Token discovery over transfer-history providers. Providers are tried in
// configured order and the first non-empty transfer list wins; when every
// provider fails the extended well-known token list stands in, so discovery
// degrades but never errors.

pub mod schema;

use failover_utils::first_success;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snapshot_core::TokenDescriptor;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("wallet not known to provider")]
    NotFound,
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("no transfer list in response body")]
    MissingList,
    #[error("provider returned an empty transfer list")]
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Ordered provider URL templates; `{address}` is replaced with the
    /// queried wallet address.
    pub provider_urls: Vec<String>,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            provider_urls: vec![
                "https://mainnet-api.kaiascan.io/api/v1/accounts/{address}/token-transfers"
                    .to_string(),
                "https://api-cypress.klaytnscope.com/v2/accounts/{address}/transfers"
                    .to_string(),
                "https://api.oklink.com/api/v5/explorer/kaia/token-transfers?address={address}"
                    .to_string(),
            ],
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Clone)]
pub struct DiscoveryClient {
    config: DiscoveryConfig,
    http_client: Client,
}

impl DiscoveryClient {
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Infer the tokens this wallet holds or has held from its transfer
    /// history. Never fails: provider exhaustion degrades to the static
    /// extended token list.
    pub async fn discover_tokens(&self, address: &str) -> Vec<TokenDescriptor> {
        let outcome = first_success(
            "token discovery",
            &self.config.provider_urls,
            |_, template| {
                let url = template.replace("{address}", address);
                async move { self.fetch_transfers(&url).await }
            },
        )
        .await;

        match outcome {
            Ok(tokens) => {
                info!("discovered {} tokens from transfer history", tokens.len());
                tokens
            }
            Err(e) => {
                warn!(
                    "transfer-history discovery unavailable, using extended token list: {}",
                    e
                );
                extended_token_list()
            }
        }
    }

    async fn fetch_transfers(&self, url: &str) -> Result<Vec<TokenDescriptor>, DiscoveryError> {
        debug!("querying transfer history: {}", url);
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DiscoveryError::NotFound);
        }
        if !status.is_success() {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        let records = schema::locate_transfer_list(&body).ok_or(DiscoveryError::MissingList)?;
        if records.is_empty() {
            return Err(DiscoveryError::Empty);
        }

        Ok(normalize_transfers(records))
    }
}

/// Decode each transfer record and deduplicate by address key, keeping the
/// first occurrence. Output order follows record order, so identical
/// responses always normalize identically.
pub fn normalize_transfers(records: &[Value]) -> Vec<TokenDescriptor> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens = Vec::new();

    for record in records {
        if let Some(token) = schema::decode_transfer(record) {
            if seen.insert(token.address_key.clone()) {
                tokens.push(token);
            }
        }
    }

    tokens
}

/// Fixed extended list of well-known Kaia tokens, returned when no provider
/// yields a usable transfer list.
pub fn extended_token_list() -> Vec<TokenDescriptor> {
    vec![
        TokenDescriptor::contract(
            "oUSDT",
            "Orbit Bridge Klaytn USD Tether",
            "0xcee8faf64bb97a73bb51e115aa89c17ffa8dd167",
            6,
            Some("orbit-bridge-klaytn-usd-tether"),
        ),
        TokenDescriptor::contract(
            "BORA",
            "BORA",
            "0x02cbe46fb8a1f579254a9b485788f2d86cad51aa",
            18,
            Some("bora"),
        ),
        TokenDescriptor::contract(
            "MBX",
            "MARBLEX",
            "0xd068c52d81f4409b9502da926ace3301cc41f623",
            18,
            Some("marblex"),
        ),
        TokenDescriptor::contract(
            "KSP",
            "KlaySwap Protocol",
            "0xc6a2ad8cc6e4a7e08fc37cc5954be07d499e7654",
            18,
            Some("klayswap-protocol"),
        ),
        TokenDescriptor::contract(
            "WKLAY",
            "Wrapped Klay",
            "0xe4f05a66ec68b54a58b17c22107b02e0232cc817",
            18,
            None,
        ),
    ]
}
