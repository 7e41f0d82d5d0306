pub mod assembler;
pub mod merge;

#[cfg(test)]
mod scenario_tests;

pub use assembler::build_snapshot;
pub use merge::merge_candidates;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Address key used for the chain's base asset, which is queried directly
/// rather than through a contract call.
pub const NATIVE_ADDRESS_KEY: &str = "native";

/// Decimal places of the native KAIA asset (wei-style base units).
pub const NATIVE_DECIMALS: u32 = 18;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("price oracle error: {0}")]
    PriceOracle(String),
    #[error("balance source error: {0}")]
    BalanceSource(String),
    #[error("record sink error: {0}")]
    RecordSink(String),
    #[error("invalid token descriptor: {0}")]
    InvalidDescriptor(String),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Metadata for one token candidate. Identity is `address_key`: the
/// lowercase contract address, or [`NATIVE_ADDRESS_KEY`] for the base asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub display_name: String,
    pub address_key: String,
    pub decimals: u32,
    /// Price oracle asset id; may be unresolved for discovered tokens until
    /// the catalog merge fills it in.
    pub price_id: Option<String>,
}

impl TokenDescriptor {
    pub fn native(symbol: &str, display_name: &str, price_id: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            display_name: display_name.to_string(),
            address_key: NATIVE_ADDRESS_KEY.to_string(),
            decimals: NATIVE_DECIMALS,
            price_id: Some(price_id.to_string()),
        }
    }

    pub fn contract(
        symbol: &str,
        display_name: &str,
        address: &str,
        decimals: u32,
        price_id: Option<&str>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            display_name: display_name.to_string(),
            address_key: address.to_lowercase(),
            decimals,
            price_id: price_id.map(str::to_string),
        }
    }

    pub fn is_native(&self) -> bool {
        self.address_key == NATIVE_ADDRESS_KEY
    }
}

/// Statically configured, trusted token list. Loaded once at process start
/// and immutable for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<TokenDescriptor>,
}

impl Catalog {
    pub fn new(entries: Vec<TokenDescriptor>) -> Self {
        Self { entries }
    }

    /// The built-in Kaia mainnet catalog: the native asset plus a small set
    /// of well-known tokens.
    pub fn kaia_mainnet() -> Self {
        Self::new(vec![
            TokenDescriptor::native("KAIA", "Kaia", "kaia"),
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
        ])
    }

    pub fn entries(&self) -> &[TokenDescriptor] {
        &self.entries
    }

    /// Look up a catalog price id by symbol (case-insensitive) or address
    /// key. Used as the second resolution step for discovered tokens.
    pub fn find_price_id(&self, symbol_or_address: &str) -> Option<&str> {
        let needle = symbol_or_address.to_lowercase();
        self.entries
            .iter()
            .find(|entry| {
                entry.symbol.to_lowercase() == needle || entry.address_key == needle
            })
            .and_then(|entry| entry.price_id.as_deref())
    }
}

/// The per-run candidate map, keyed by `address_key`. Insertion-ordered:
/// catalog entries come first, discoveries after, which makes run output
/// deterministic. Existing keys always win on collision.
#[derive(Debug, Clone, Default)]
pub struct MergedCandidateSet {
    ordered: Vec<TokenDescriptor>,
    index: HashMap<String, usize>,
}

impl MergedCandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate unless its key is already taken. Returns whether
    /// the token was inserted.
    pub fn insert(&mut self, token: TokenDescriptor) -> bool {
        let key = token.address_key.to_lowercase();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.ordered.len());
        self.ordered.push(token);
        true
    }

    pub fn contains_key(&self, address_key: &str) -> bool {
        self.index.contains_key(&address_key.to_lowercase())
    }

    pub fn get(&self, address_key: &str) -> Option<&TokenDescriptor> {
        self.index
            .get(&address_key.to_lowercase())
            .map(|&position| &self.ordered[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenDescriptor> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// A USD/KRW price pair for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiatQuote {
    pub usd: Decimal,
    pub krw: Decimal,
}

impl FiatQuote {
    pub const ZERO: FiatQuote = FiatQuote {
        usd: Decimal::ZERO,
        krw: Decimal::ZERO,
    };
}

/// Outcome of a balance query after endpoint failover.
///
/// `Undetermined` means every configured endpoint was exhausted without a
/// usable result. The historical behavior is to observe such balances as
/// zero (`amount_or_zero`), so callers cannot distinguish "empty wallet"
/// from "all endpoints down" unless they inspect the resolution itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceResolution {
    Amount(Decimal),
    Undetermined,
}

impl BalanceResolution {
    pub fn amount_or_zero(&self) -> Decimal {
        match self {
            BalanceResolution::Amount(amount) => *amount,
            BalanceResolution::Undetermined => Decimal::ZERO,
        }
    }

    pub fn is_undetermined(&self) -> bool {
        matches!(self, BalanceResolution::Undetermined)
    }
}

/// One asset candidate returned by the price oracle's free-text search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHit {
    pub id: String,
    pub symbol: String,
}

/// One valued holding, ready for the record sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub date: NaiveDate,
    pub chain_label: String,
    pub token_symbol: String,
    pub balance: Decimal,
    pub price_usd: Decimal,
    pub price_krw: Decimal,
    pub total_value_usd: Decimal,
    pub total_value_krw: Decimal,
    pub wallet_address: String,
}

/// Batched fiat price lookup by asset id.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetch quotes for every id in one request. Every requested id is
    /// present in the result; ids unknown upstream map to a zero quote.
    async fn prices(&self, ids: &[String]) -> Result<HashMap<String, FiatQuote>>;

    /// Free-text asset search, used for best-effort price id resolution.
    async fn search(&self, query: &str) -> Result<Vec<AssetHit>>;
}

/// Balance queries against the chain, native and contract-token paths.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn native_balance(&self, address: &str) -> Result<BalanceResolution>;

    async fn token_balance(
        &self,
        address: &str,
        contract_address: &str,
        decimals: u32,
    ) -> Result<BalanceResolution>;
}

/// External record store. The core hands over one snapshot at a time and
/// does not know how it is persisted.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, snapshot: &WalletSnapshot) -> Result<()>;
}
