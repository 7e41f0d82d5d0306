// Notion database sink: one page appended per wallet snapshot.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use snapshot_core::{RecordSink, SnapshotError, WalletSnapshot};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Notion API revision the page payload is written against.
pub const NOTION_VERSION: &str = "2022-06-28";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Notion API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid sink configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Clone)]
pub struct NotionClient {
    http_client: Client,
    base_url: String,
    api_token: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(
        base_url: &str,
        api_token: &str,
        database_id: &str,
        request_timeout_seconds: u64,
    ) -> Result<Self> {
        if api_token.is_empty() {
            return Err(PersistenceError::Config(
                "Notion API token is required".to_string(),
            ));
        }
        if database_id.is_empty() {
            return Err(PersistenceError::Config(
                "Notion database id is required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(request_timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            database_id: database_id.to_string(),
        })
    }

    /// Append one snapshot as a new database page.
    pub async fn append_snapshot(&self, snapshot: &WalletSnapshot) -> Result<()> {
        let payload = page_payload(&self.database_id, snapshot);

        let response = self
            .http_client
            .post(format!("{}/v1/pages", self.base_url))
            .bearer_auth(&self.api_token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Api { status, body });
        }

        info!(
            "✅ appended snapshot row: {} {} ({})",
            snapshot.chain_label, snapshot.token_symbol, snapshot.date
        );
        Ok(())
    }
}

/// Build the page creation body with the database's nine properties.
fn page_payload(database_id: &str, snapshot: &WalletSnapshot) -> Value {
    json!({
        "parent": { "database_id": database_id },
        "properties": {
            "날짜": {
                "title": [{ "text": { "content": snapshot.date.format("%Y-%m-%d").to_string() } }]
            },
            "체인": {
                "rich_text": [{ "text": { "content": &snapshot.chain_label } }]
            },
            "토큰": {
                "rich_text": [{ "text": { "content": &snapshot.token_symbol } }]
            },
            "보유량": { "number": to_number(snapshot.balance) },
            "가격USD": { "number": to_number(snapshot.price_usd) },
            "가격KRW": { "number": to_number(snapshot.price_krw) },
            "총가치USD": { "number": to_number(snapshot.total_value_usd) },
            "총가치KRW": { "number": to_number(snapshot.total_value_krw) },
            "지갑주소": {
                "rich_text": [{ "text": { "content": &snapshot.wallet_address } }]
            }
        }
    })
}

/// Notion number properties are plain JSON numbers; precision narrows to f64
/// at this boundary only.
fn to_number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[async_trait]
impl RecordSink for NotionClient {
    async fn append(&self, snapshot: &WalletSnapshot) -> snapshot_core::Result<()> {
        self.append_snapshot(snapshot)
            .await
            .map_err(|e| SnapshotError::RecordSink(e.to_string()))
    }
}
