//! End-to-end behavior of the merger and assembler against scripted
//! balance/price sources.

use crate::{
    build_snapshot, merge_candidates, AssetHit, BalanceResolution, BalanceSource, Catalog,
    FiatQuote, PriceOracle, Result, SnapshotError, TokenDescriptor,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Default)]
struct StaticOracle {
    prices: HashMap<String, FiatQuote>,
    hits: Vec<AssetHit>,
    fail_prices: bool,
    fail_search: bool,
}

#[async_trait]
impl PriceOracle for StaticOracle {
    async fn prices(&self, ids: &[String]) -> Result<HashMap<String, FiatQuote>> {
        if self.fail_prices {
            return Err(SnapshotError::PriceOracle("oracle down".to_string()));
        }
        Ok(ids
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    self.prices.get(id).copied().unwrap_or(FiatQuote::ZERO),
                )
            })
            .collect())
    }

    async fn search(&self, _query: &str) -> Result<Vec<AssetHit>> {
        if self.fail_search {
            return Err(SnapshotError::PriceOracle("search down".to_string()));
        }
        Ok(self.hits.clone())
    }
}

#[derive(Default)]
struct ScriptedBalances {
    native: Option<BalanceResolution>,
    tokens: HashMap<String, BalanceResolution>,
    failing_contracts: HashSet<String>,
}

#[async_trait]
impl BalanceSource for ScriptedBalances {
    async fn native_balance(&self, _address: &str) -> Result<BalanceResolution> {
        Ok(self
            .native
            .unwrap_or(BalanceResolution::Amount(Decimal::ZERO)))
    }

    async fn token_balance(
        &self,
        _address: &str,
        contract_address: &str,
        _decimals: u32,
    ) -> Result<BalanceResolution> {
        if self.failing_contracts.contains(contract_address) {
            return Err(SnapshotError::BalanceSource(format!(
                "query failed for {}",
                contract_address
            )));
        }
        Ok(self
            .tokens
            .get(contract_address)
            .copied()
            .unwrap_or(BalanceResolution::Amount(Decimal::ZERO)))
    }
}

fn quote(usd: Decimal, krw: Decimal) -> FiatQuote {
    FiatQuote { usd, krw }
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
}

const WALLET: &str = "0x1111111111111111111111111111111111111111";

#[tokio::test]
async fn test_every_catalog_entry_survives_merge() {
    let catalog = Catalog::kaia_mainnet();
    let discovered = vec![
        TokenDescriptor::contract("XYZ", "Xyz", "0xaaaa", 18, Some("xyz")),
        // Collides with the catalog's BORA entry in a different case
        TokenDescriptor::contract(
            "FAKE",
            "Fake Bora",
            "0x02CBE46FB8A1F579254A9B485788F2D86CAD51AA",
            6,
            None,
        ),
    ];

    let merged = merge_candidates(&catalog, discovered, &StaticOracle::default()).await;

    for entry in catalog.entries() {
        let survivor = merged.get(&entry.address_key).expect("catalog entry dropped");
        assert_eq!(survivor, entry);
    }
}

#[tokio::test]
async fn test_catalog_wins_collision_case_insensitively() {
    let catalog = Catalog::kaia_mainnet();
    let discovered = vec![TokenDescriptor::contract(
        "IMPOSTER",
        "Imposter",
        "0x02CBE46FB8A1F579254A9B485788F2D86CAD51AA",
        0,
        Some("imposter"),
    )];

    let merged = merge_candidates(&catalog, discovered, &StaticOracle::default()).await;

    let survivor = merged
        .get("0x02cbe46fb8a1f579254a9b485788f2d86cad51aa")
        .unwrap();
    assert_eq!(survivor.symbol, "BORA");
    assert_eq!(merged.len(), catalog.entries().len());
}

#[tokio::test]
async fn test_price_id_resolved_from_search_exact_symbol_match() {
    let oracle = StaticOracle {
        hits: vec![
            AssetHit {
                id: "not-it".to_string(),
                symbol: "XYZX".to_string(),
            },
            AssetHit {
                id: "xyz-protocol".to_string(),
                symbol: "xyz".to_string(),
            },
        ],
        ..Default::default()
    };
    let discovered = vec![TokenDescriptor::contract("XYZ", "Xyz", "0xaaaa", 18, None)];

    let merged = merge_candidates(&Catalog::kaia_mainnet(), discovered, &oracle).await;

    assert_eq!(
        merged.get("0xaaaa").unwrap().price_id.as_deref(),
        Some("xyz-protocol")
    );
}

#[tokio::test]
async fn test_price_id_falls_back_to_catalog_then_symbol() {
    // Search yields nothing useful; symbol matches a catalog entry.
    let discovered = vec![TokenDescriptor::contract(
        "bora",
        "Bridged BORA",
        "0xbbbb",
        18,
        None,
    )];
    let merged =
        merge_candidates(&Catalog::kaia_mainnet(), discovered, &StaticOracle::default()).await;
    assert_eq!(merged.get("0xbbbb").unwrap().price_id.as_deref(), Some("bora"));

    // No search hit, no catalog match, search erroring: lowercased symbol.
    let oracle = StaticOracle {
        fail_search: true,
        ..Default::default()
    };
    let discovered = vec![TokenDescriptor::contract("NEW", "New Token", "0xcccc", 18, None)];
    let merged = merge_candidates(&Catalog::kaia_mainnet(), discovered, &oracle).await;
    assert_eq!(merged.get("0xcccc").unwrap().price_id.as_deref(), Some("new"));
}

#[tokio::test]
async fn test_scenario_native_only_wallet() {
    let catalog = Catalog::kaia_mainnet();
    let merged = merge_candidates(&catalog, Vec::new(), &StaticOracle::default()).await;

    let balances = ScriptedBalances {
        native: Some(BalanceResolution::Amount(Decimal::from(10))),
        ..Default::default()
    };
    let oracle = StaticOracle {
        prices: HashMap::from([(
            "kaia".to_string(),
            quote(Decimal::new(123, 2), Decimal::from(1500)),
        )]),
        ..Default::default()
    };

    let snapshots = build_snapshot(
        run_date(),
        WALLET,
        "Kaia",
        &merged,
        &balances,
        &oracle,
        Duration::ZERO,
    )
    .await;

    assert_eq!(snapshots.len(), 1);
    let record = &snapshots[0];
    assert_eq!(record.token_symbol, "KAIA");
    assert_eq!(record.balance, Decimal::from(10));
    assert_eq!(record.total_value_usd, Decimal::new(123, 1)); // 12.3
    assert_eq!(record.total_value_krw, Decimal::from(15000));
    assert_eq!(record.wallet_address, WALLET);
}

#[tokio::test]
async fn test_scenario_exhausted_endpoints_exclude_token() {
    let catalog = Catalog::kaia_mainnet();
    let merged = merge_candidates(&catalog, Vec::new(), &StaticOracle::default()).await;

    let balances = ScriptedBalances {
        native: Some(BalanceResolution::Amount(Decimal::ONE)),
        tokens: HashMap::from([(
            "0x02cbe46fb8a1f579254a9b485788f2d86cad51aa".to_string(),
            BalanceResolution::Undetermined,
        )]),
        ..Default::default()
    };

    let snapshots = build_snapshot(
        run_date(),
        WALLET,
        "Kaia",
        &merged,
        &balances,
        &StaticOracle::default(),
        Duration::ZERO,
    )
    .await;

    assert!(snapshots.iter().all(|s| s.token_symbol != "BORA"));
    assert_eq!(snapshots.len(), 1);
}

#[tokio::test]
async fn test_scenario_discovery_adds_exactly_one_lowercased_key() {
    let catalog = Catalog::kaia_mainnet();
    // The shape discovery would produce from the second provider after the
    // first answered "not found": one record, unknown contract, symbol XYZ.
    let discovered = vec![TokenDescriptor::contract(
        "XYZ",
        "XYZ",
        "0xD3ADB33FD3ADB33FD3ADB33FD3ADB33FD3ADB33F",
        18,
        None,
    )];

    let merged = merge_candidates(&catalog, discovered, &StaticOracle::default()).await;

    assert_eq!(merged.len(), catalog.entries().len() + 1);
    let added = merged
        .get("0xd3adb33fd3adb33fd3adb33fd3adb33fd3adb33f")
        .expect("discovered token missing");
    assert_eq!(added.symbol, "XYZ");
}

#[tokio::test]
async fn test_zero_balances_never_materialize_and_products_are_exact() {
    let catalog = Catalog::kaia_mainnet();
    let merged = merge_candidates(&catalog, Vec::new(), &StaticOracle::default()).await;

    let balances = ScriptedBalances {
        native: Some(BalanceResolution::Amount(Decimal::new(25, 1))), // 2.5
        tokens: HashMap::from([
            (
                "0x02cbe46fb8a1f579254a9b485788f2d86cad51aa".to_string(),
                BalanceResolution::Amount(Decimal::from(7)),
            ),
            (
                "0xcee8faf64bb97a73bb51e115aa89c17ffa8dd167".to_string(),
                BalanceResolution::Amount(Decimal::ZERO),
            ),
        ]),
        ..Default::default()
    };
    let oracle = StaticOracle {
        prices: HashMap::from([
            (
                "kaia".to_string(),
                quote(Decimal::new(117, 2), Decimal::from(1625)),
            ),
            (
                "bora".to_string(),
                quote(Decimal::new(92, 3), Decimal::from(127)),
            ),
        ]),
        ..Default::default()
    };

    let snapshots = build_snapshot(
        run_date(),
        WALLET,
        "Kaia",
        &merged,
        &balances,
        &oracle,
        Duration::ZERO,
    )
    .await;

    assert_eq!(snapshots.len(), 2);
    for record in &snapshots {
        assert!(record.balance > Decimal::ZERO);
        assert_eq!(record.total_value_usd, record.balance * record.price_usd);
        assert_eq!(record.total_value_krw, record.balance * record.price_krw);
    }
}

#[tokio::test]
async fn test_per_token_failure_skips_only_that_token() {
    let catalog = Catalog::kaia_mainnet();
    let merged = merge_candidates(&catalog, Vec::new(), &StaticOracle::default()).await;

    let balances = ScriptedBalances {
        native: Some(BalanceResolution::Amount(Decimal::ONE)),
        tokens: HashMap::from([(
            "0x02cbe46fb8a1f579254a9b485788f2d86cad51aa".to_string(),
            BalanceResolution::Amount(Decimal::from(3)),
        )]),
        failing_contracts: HashSet::from([
            "0xcee8faf64bb97a73bb51e115aa89c17ffa8dd167".to_string()
        ]),
    };

    let snapshots = build_snapshot(
        run_date(),
        WALLET,
        "Kaia",
        &merged,
        &balances,
        &StaticOracle::default(),
        Duration::ZERO,
    )
    .await;

    let symbols: Vec<&str> = snapshots.iter().map(|s| s.token_symbol.as_str()).collect();
    assert_eq!(symbols, vec!["KAIA", "BORA"]);
}

#[tokio::test]
async fn test_oracle_failure_values_holdings_at_zero() {
    let catalog = Catalog::kaia_mainnet();
    let merged = merge_candidates(&catalog, Vec::new(), &StaticOracle::default()).await;

    let balances = ScriptedBalances {
        native: Some(BalanceResolution::Amount(Decimal::from(4))),
        ..Default::default()
    };
    let oracle = StaticOracle {
        fail_prices: true,
        ..Default::default()
    };

    let snapshots = build_snapshot(
        run_date(),
        WALLET,
        "Kaia",
        &merged,
        &balances,
        &oracle,
        Duration::ZERO,
    )
    .await;

    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].balance, Decimal::from(4));
    assert_eq!(snapshots[0].price_usd, Decimal::ZERO);
    assert_eq!(snapshots[0].total_value_usd, Decimal::ZERO);
}
