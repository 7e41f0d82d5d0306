//! Decoders for the transfer-history provider schemas.
//!
//! Providers disagree both on where the transfer list lives in the response
//! body and on how a transfer record names its token fields. The list is
//! located by probing a fixed set of top-level keys; each record is then
//! offered to the named decoders below in a fixed order, and the first one
//! that yields a contract address or symbol produces the canonical
//! descriptor.

use serde::Deserialize;
use serde_json::Value;
use snapshot_core::{TokenDescriptor, NATIVE_ADDRESS_KEY, NATIVE_DECIMALS};

/// Top-level keys a provider may nest its transfer list under, probed in
/// this order. A body that is itself an array is taken as the list.
const TRANSFER_LIST_KEYS: [&str; 3] = ["results", "data", "items"];

/// Assumed decimal count when a provider omits it; the KIP-7 default.
const DEFAULT_TOKEN_DECIMALS: u32 = 18;

pub fn locate_transfer_list(body: &Value) -> Option<&Vec<Value>> {
    match body.as_object() {
        Some(object) => TRANSFER_LIST_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array)),
        None => body.as_array(),
    }
}

/// Flat snake_case explorer records:
/// `{"contract_address": "0x..", "symbol": "BORA", "name": "..", "decimals": 18}`
#[derive(Debug, Deserialize)]
struct ExplorerTransfer {
    contract_address: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    decimals: Option<u32>,
}

/// camelCase scope records:
/// `{"tokenAddress": "0x..", "tokenSymbol": "BORA", "tokenName": "..", "tokenDecimals": 18}`
#[derive(Debug, Deserialize)]
struct ScopeTransfer {
    #[serde(rename = "tokenAddress")]
    token_address: Option<String>,
    #[serde(rename = "tokenSymbol")]
    token_symbol: Option<String>,
    #[serde(rename = "tokenName")]
    token_name: Option<String>,
    #[serde(rename = "tokenDecimals")]
    token_decimals: Option<u32>,
}

/// Records that nest token metadata under a `contract` object:
/// `{"contract": {"address": "0x..", "symbol": "BORA", ...}}`
#[derive(Debug, Deserialize)]
struct NestedTransfer {
    contract: Option<ContractInfo>,
}

#[derive(Debug, Deserialize)]
struct ContractInfo {
    address: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    decimals: Option<u32>,
}

/// Raw token attributes pulled out of one record by one decoder.
struct RawTokenFields {
    address: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    decimals: Option<u32>,
}

impl RawTokenFields {
    fn is_resolvable(&self) -> bool {
        self.address.is_some() || self.symbol.is_some()
    }
}

/// Decode one transfer record into a canonical descriptor, or `None` when
/// no decoder can resolve a contract address or symbol from it.
pub fn decode_transfer(record: &Value) -> Option<TokenDescriptor> {
    const DECODERS: [fn(&Value) -> Option<RawTokenFields>; 3] =
        [decode_explorer, decode_scope, decode_nested];

    DECODERS
        .iter()
        .find_map(|decode| decode(record).filter(RawTokenFields::is_resolvable))
        .map(canonicalize)
}

fn decode_explorer(record: &Value) -> Option<RawTokenFields> {
    let transfer: ExplorerTransfer = serde_json::from_value(record.clone()).ok()?;
    Some(RawTokenFields {
        address: transfer.contract_address,
        symbol: transfer.symbol,
        name: transfer.name,
        decimals: transfer.decimals,
    })
}

fn decode_scope(record: &Value) -> Option<RawTokenFields> {
    let transfer: ScopeTransfer = serde_json::from_value(record.clone()).ok()?;
    Some(RawTokenFields {
        address: transfer.token_address,
        symbol: transfer.token_symbol,
        name: transfer.token_name,
        decimals: transfer.token_decimals,
    })
}

fn decode_nested(record: &Value) -> Option<RawTokenFields> {
    let transfer: NestedTransfer = serde_json::from_value(record.clone()).ok()?;
    let contract = transfer.contract?;
    Some(RawTokenFields {
        address: contract.address,
        symbol: contract.symbol,
        name: contract.name,
        decimals: contract.decimals,
    })
}

/// A transfer without a contract address is a native-coin movement, keyed by
/// the native sentinel so the catalog entry wins the merge.
fn canonicalize(fields: RawTokenFields) -> TokenDescriptor {
    let (address_key, decimals) = match &fields.address {
        Some(address) => (
            address.to_lowercase(),
            fields.decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
        ),
        None => (NATIVE_ADDRESS_KEY.to_string(), NATIVE_DECIMALS),
    };

    let symbol = fields
        .symbol
        .unwrap_or_else(|| fallback_symbol(&address_key));
    let display_name = fields.name.unwrap_or_else(|| symbol.clone());

    TokenDescriptor {
        symbol,
        display_name,
        address_key,
        decimals,
        price_id: None,
    }
}

fn fallback_symbol(address_key: &str) -> String {
    let hex = address_key.strip_prefix("0x").unwrap_or(address_key);
    format!("TOKEN-{}", &hex[..hex.len().min(6)].to_uppercase())
}
