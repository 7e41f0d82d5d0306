// Kaia JSON-RPC balance resolver with ordered endpoint failover.

use async_trait::async_trait;
use failover_utils::first_success;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use snapshot_core::{BalanceResolution, BalanceSource, NATIVE_DECIMALS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// KIP-7 / ERC-20 `balanceOf(address)` function selector.
pub const BALANCE_OF_SELECTOR: &str = "70a08231";

/// JSON-RPC error code for an unrecognized method name.
const METHOD_NOT_FOUND: i64 = -32601;

/// Current and legacy names for one RPC capability. The chain renamed its
/// `klay_` namespace to `kaia_`; public endpoints disagree on which vintage
/// they accept.
#[derive(Debug, Clone, Copy)]
struct MethodPair {
    current: &'static str,
    legacy: &'static str,
}

const NATIVE_BALANCE_METHODS: MethodPair = MethodPair {
    current: "kaia_getBalance",
    legacy: "klay_getBalance",
};

const CONTRACT_CALL_METHODS: MethodPair = MethodPair {
    current: "kaia_call",
    legacy: "klay_call",
};

#[derive(Error, Debug)]
pub enum KaiaRpcError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint rejected method name")]
    UnsupportedMethod,
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("endpoint returned no usable data")]
    EmptyResult,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KaiaRpcConfig {
    /// Ordered endpoint list; always tried first to last, never reordered.
    pub endpoints: Vec<String>,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for KaiaRpcConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://public-en-cypress.klaytn.net".to_string(),
                "https://rpc.ankr.com/klaytn".to_string(),
                "https://klaytn-mainnet.gateway.tatum.io".to_string(),
            ],
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Clone)]
pub struct KaiaRpcClient {
    config: KaiaRpcConfig,
    http_client: Client,
    request_id_counter: Arc<AtomicU64>,
}

impl KaiaRpcClient {
    pub fn new(config: KaiaRpcConfig) -> Result<Self, KaiaRpcError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
            request_id_counter: Arc::new(AtomicU64::new(1)),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.request_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Resolve the wallet's native KAIA balance.
    ///
    /// Endpoints are tried in configured order; each gets one shot with the
    /// current method name and, only on an "unknown method" rejection, one
    /// more with the legacy name. The first usable quantity wins. Exhausting
    /// every endpoint yields [`BalanceResolution::Undetermined`], which
    /// callers conventionally observe as zero.
    pub async fn resolve_native_balance(&self, address: &str) -> BalanceResolution {
        let params = json!([address, "latest"]);

        let outcome = first_success("native balance", &self.config.endpoints, |_, endpoint| {
            let params = params.clone();
            async move {
                let result = self
                    .call_with_method_fallback(endpoint, NATIVE_BALANCE_METHODS, params)
                    .await?;
                decode_quantity(&result, NATIVE_DECIMALS)
            }
        })
        .await;

        match outcome {
            Ok(amount) => BalanceResolution::Amount(amount),
            Err(e) => {
                warn!("native balance undetermined for {}: {}", address, e);
                BalanceResolution::Undetermined
            }
        }
    }

    /// Resolve a contract-token balance via a read-only `balanceOf` call,
    /// scaled by the token's declared decimal count. Same endpoint and
    /// method-name failover as the native path; a "no data" result counts
    /// as that endpoint failing.
    pub async fn resolve_token_balance(
        &self,
        address: &str,
        contract_address: &str,
        decimals: u32,
    ) -> BalanceResolution {
        let data = match encode_balance_of_call(address) {
            Ok(data) => data,
            Err(e) => {
                warn!("cannot query {}: {}", contract_address, e);
                return BalanceResolution::Undetermined;
            }
        };
        let params = json!([{ "to": contract_address, "data": data }, "latest"]);

        let outcome = first_success("token balance", &self.config.endpoints, |_, endpoint| {
            let params = params.clone();
            async move {
                let result = self
                    .call_with_method_fallback(endpoint, CONTRACT_CALL_METHODS, params)
                    .await?;
                decode_quantity(&result, decimals)
            }
        })
        .await;

        match outcome {
            Ok(amount) => BalanceResolution::Amount(amount),
            Err(e) => {
                warn!(
                    "token balance undetermined for {} at {}: {}",
                    address, contract_address, e
                );
                BalanceResolution::Undetermined
            }
        }
    }

    async fn call_with_method_fallback(
        &self,
        endpoint: &str,
        methods: MethodPair,
        params: Value,
    ) -> Result<Value, KaiaRpcError> {
        match self.rpc_call(endpoint, methods.current, params.clone()).await {
            Err(KaiaRpcError::UnsupportedMethod) => {
                debug!(
                    "{} does not know {}, retrying with {}",
                    endpoint, methods.current, methods.legacy
                );
                self.rpc_call(endpoint, methods.legacy, params).await
            }
            other => other,
        }
    }

    async fn rpc_call(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, KaiaRpcError> {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id(),
            "method": method,
            "params": params
        });

        let response = self
            .http_client
            .post(endpoint)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(KaiaRpcError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: RpcResponse = response.json().await?;
        interpret_response(body)
    }
}

/// Map a decoded JSON-RPC envelope onto the failure taxonomy: an unknown
/// method triggers the same-endpoint legacy retry, anything else without a
/// result advances to the next endpoint.
fn interpret_response(body: RpcResponse) -> Result<Value, KaiaRpcError> {
    if let Some(error) = body.error {
        if error.code == METHOD_NOT_FOUND {
            return Err(KaiaRpcError::UnsupportedMethod);
        }
        return Err(KaiaRpcError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    match body.result {
        Some(Value::Null) | None => Err(KaiaRpcError::EmptyResult),
        Some(result) => Ok(result),
    }
}

/// Build the `balanceOf(address)` call data: the 4-byte selector followed by
/// the queried address left-padded to 32 bytes.
fn encode_balance_of_call(address: &str) -> Result<String, KaiaRpcError> {
    let hex = address.strip_prefix("0x").unwrap_or(address);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KaiaRpcError::InvalidAddress(address.to_string()));
    }
    Ok(format!(
        "0x{}{:0>64}",
        BALANCE_OF_SELECTOR,
        hex.to_lowercase()
    ))
}

/// Decode a hex quantity into a decimal amount scaled by `decimals` base-10
/// places. A result of exactly no data (`"0x"` or an empty string) is not a
/// value; quantities beyond 128 bits or scales beyond what [`Decimal`] can
/// carry are unusable results, not panics.
fn decode_quantity(result: &Value, decimals: u32) -> Result<Decimal, KaiaRpcError> {
    let text = result
        .as_str()
        .ok_or_else(|| KaiaRpcError::InvalidResponse(format!("non-string result: {}", result)))?;
    let hex = text.strip_prefix("0x").unwrap_or(text);

    if hex.is_empty() {
        return Err(KaiaRpcError::EmptyResult);
    }

    let significant = hex.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(Decimal::ZERO);
    }
    if significant.len() > 32 {
        return Err(KaiaRpcError::InvalidResponse(format!(
            "quantity exceeds 128 bits: {}",
            text
        )));
    }

    let raw = u128::from_str_radix(significant, 16)
        .map_err(|e| KaiaRpcError::InvalidResponse(format!("bad hex quantity {}: {}", text, e)))?;
    if raw > i128::MAX as u128 {
        return Err(KaiaRpcError::InvalidResponse(format!(
            "quantity exceeds supported range: {}",
            text
        )));
    }

    Decimal::try_from_i128_with_scale(raw as i128, decimals).map_err(|e| {
        KaiaRpcError::InvalidResponse(format!("cannot scale {} by 10^-{}: {}", raw, decimals, e))
    })
}

#[async_trait]
impl BalanceSource for KaiaRpcClient {
    async fn native_balance(
        &self,
        address: &str,
    ) -> snapshot_core::Result<BalanceResolution> {
        Ok(self.resolve_native_balance(address).await)
    }

    async fn token_balance(
        &self,
        address: &str,
        contract_address: &str,
        decimals: u32,
    ) -> snapshot_core::Result<BalanceResolution> {
        Ok(self
            .resolve_token_balance(address, contract_address, decimals)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0xAbCd111122223333444455556666777788889999";

    #[test]
    fn test_balance_of_call_encoding() {
        let data = encode_balance_of_call(ADDRESS).unwrap();
        assert_eq!(
            data,
            "0x70a08231000000000000000000000000abcd111122223333444455556666777788889999"
        );
        // 0x + 8 selector chars + 64 padded address chars
        assert_eq!(data.len(), 2 + 8 + 64);
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        assert!(matches!(
            encode_balance_of_call("0x1234"),
            Err(KaiaRpcError::InvalidAddress(_))
        ));
        assert!(matches!(
            encode_balance_of_call("0xzzzz111122223333444455556666777788889999"),
            Err(KaiaRpcError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_quantity_decoding_scales_by_decimals() {
        // 1 KAIA in wei
        let one = decode_quantity(&json!("0xde0b6b3a7640000"), 18).unwrap();
        assert_eq!(one, Decimal::ONE);

        // 2500000 base units of a 6-decimal token
        let amount = decode_quantity(&json!("0x2625a0"), 6).unwrap();
        assert_eq!(amount, Decimal::new(25, 1));
    }

    #[test]
    fn test_zero_quantity_is_a_value_but_no_data_is_not() {
        assert_eq!(decode_quantity(&json!("0x0"), 18).unwrap(), Decimal::ZERO);
        assert_eq!(decode_quantity(&json!("0x000"), 18).unwrap(), Decimal::ZERO);
        assert!(matches!(
            decode_quantity(&json!("0x"), 18),
            Err(KaiaRpcError::EmptyResult)
        ));
    }

    #[test]
    fn test_oversized_quantities_are_unusable() {
        let wide = format!("0x{}", "f".repeat(33));
        assert!(matches!(
            decode_quantity(&json!(wide), 18),
            Err(KaiaRpcError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_quantity(&json!("0x1"), 29),
            Err(KaiaRpcError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_method_not_found_triggers_legacy_retry_classification() {
        let body = RpcResponse {
            jsonrpc: Some("2.0".to_string()),
            result: None,
            error: Some(RpcErrorBody {
                code: METHOD_NOT_FOUND,
                message: "the method kaia_getBalance does not exist".to_string(),
            }),
        };
        assert!(matches!(
            interpret_response(body),
            Err(KaiaRpcError::UnsupportedMethod)
        ));
    }

    #[test]
    fn test_other_rpc_errors_advance_to_next_endpoint() {
        let body = RpcResponse {
            jsonrpc: Some("2.0".to_string()),
            result: None,
            error: Some(RpcErrorBody {
                code: -32000,
                message: "upstream overloaded".to_string(),
            }),
        };
        assert!(matches!(
            interpret_response(body),
            Err(KaiaRpcError::Rpc { code: -32000, .. })
        ));
    }

    #[test]
    fn test_missing_result_is_empty() {
        let body = RpcResponse {
            jsonrpc: Some("2.0".to_string()),
            result: None,
            error: None,
        };
        assert!(matches!(
            interpret_response(body),
            Err(KaiaRpcError::EmptyResult)
        ));

        let null_body = RpcResponse {
            jsonrpc: Some("2.0".to_string()),
            result: Some(Value::Null),
            error: None,
        };
        assert!(matches!(
            interpret_response(null_body),
            Err(KaiaRpcError::EmptyResult)
        ));
    }
}
