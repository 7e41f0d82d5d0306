use crate::{
    BalanceSource, FiatQuote, MergedCandidateSet, PriceOracle, Result, TokenDescriptor,
    WalletSnapshot,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Build the valued snapshot list for one run.
///
/// Candidates are processed strictly in the merged set's iteration order,
/// with `throttle` slept between successive balance checks to bound the
/// outbound request rate. Zero and undetermined balances are skipped before
/// any price lookup. Prices for all surviving candidates are fetched in one
/// batched oracle call; ids missing upstream value at zero. A failure on one
/// candidate is logged and skips that candidate only.
pub async fn build_snapshot(
    date: NaiveDate,
    wallet_address: &str,
    chain_label: &str,
    candidates: &MergedCandidateSet,
    balances: &dyn BalanceSource,
    oracle: &dyn PriceOracle,
    throttle: Duration,
) -> Vec<WalletSnapshot> {
    let mut holdings: Vec<(TokenDescriptor, Decimal)> = Vec::new();

    for (position, token) in candidates.iter().enumerate() {
        if position > 0 && !throttle.is_zero() {
            sleep(throttle).await;
        }

        match resolve_holding(wallet_address, token, balances).await {
            Ok(Some(balance)) => holdings.push((token.clone(), balance)),
            Ok(None) => {}
            Err(e) => warn!("skipping {}: {}", token.symbol, e),
        }
    }

    if holdings.is_empty() {
        info!("no holdings with positive balance for {}", wallet_address);
        return Vec::new();
    }

    let quotes = fetch_quotes(&holdings, oracle).await;

    holdings
        .into_iter()
        .map(|(token, balance)| {
            let quote = token
                .price_id
                .as_ref()
                .and_then(|id| quotes.get(id).copied())
                .unwrap_or(FiatQuote::ZERO);

            WalletSnapshot {
                date,
                chain_label: chain_label.to_string(),
                token_symbol: token.symbol,
                balance,
                price_usd: quote.usd,
                price_krw: quote.krw,
                total_value_usd: balance * quote.usd,
                total_value_krw: balance * quote.krw,
                wallet_address: wallet_address.to_string(),
            }
        })
        .collect()
}

/// Resolve one candidate's balance. `None` means the candidate holds
/// nothing and must not be priced or materialized.
async fn resolve_holding(
    wallet_address: &str,
    token: &TokenDescriptor,
    balances: &dyn BalanceSource,
) -> Result<Option<Decimal>> {
    let resolution = if token.is_native() {
        balances.native_balance(wallet_address).await?
    } else {
        balances
            .token_balance(wallet_address, &token.address_key, token.decimals)
            .await?
    };

    if resolution.is_undetermined() {
        warn!(
            "balance for {} undetermined after exhausting endpoints, observing as zero",
            token.symbol
        );
    }

    let balance = resolution.amount_or_zero();
    if balance > Decimal::ZERO {
        debug!("{}: balance {}", token.symbol, balance);
        Ok(Some(balance))
    } else {
        debug!("{}: zero balance, skipped", token.symbol);
        Ok(None)
    }
}

/// One batched price lookup for every distinct price id among the holdings.
/// An oracle failure degrades every quote to zero, mirroring the historical
/// behavior of valuing unpriceable holdings at nothing rather than aborting.
async fn fetch_quotes(
    holdings: &[(TokenDescriptor, Decimal)],
    oracle: &dyn PriceOracle,
) -> HashMap<String, FiatQuote> {
    let mut ids: Vec<String> = Vec::new();
    for (token, _) in holdings {
        match &token.price_id {
            Some(id) if !ids.contains(id) => ids.push(id.clone()),
            Some(_) => {}
            None => warn!("{} has no price id, valuing at zero", token.symbol),
        }
    }

    if ids.is_empty() {
        return HashMap::new();
    }

    match oracle.prices(&ids).await {
        Ok(quotes) => quotes,
        Err(e) => {
            warn!("price lookup failed, valuing {} assets at zero: {}", ids.len(), e);
            ids.into_iter().map(|id| (id, FiatQuote::ZERO)).collect()
        }
    }
}
