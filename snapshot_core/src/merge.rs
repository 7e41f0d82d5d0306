use crate::{Catalog, MergedCandidateSet, PriceOracle, TokenDescriptor};
use tracing::{debug, warn};

/// Combine the static catalog with the tokens discovered this run.
///
/// The catalog is seeded first and always wins on an address-key collision.
/// Discovered tokens without a price id get one resolved best-effort before
/// insertion: an exact (case-insensitive) symbol match from the oracle's
/// free-text search, else a catalog entry matching the symbol or address,
/// else the lowercased symbol itself. Resolution failures never fail the
/// merge.
pub async fn merge_candidates(
    catalog: &Catalog,
    discovered: Vec<TokenDescriptor>,
    oracle: &dyn PriceOracle,
) -> MergedCandidateSet {
    let mut merged = MergedCandidateSet::new();

    for entry in catalog.entries() {
        merged.insert(entry.clone());
    }

    for mut token in discovered {
        if merged.contains_key(&token.address_key) {
            debug!(
                "discovered token {} already cataloged, keeping catalog entry",
                token.symbol
            );
            continue;
        }

        if token.price_id.is_none() {
            token.price_id = Some(resolve_price_id(catalog, &token, oracle).await);
        }

        merged.insert(token);
    }

    merged
}

async fn resolve_price_id(
    catalog: &Catalog,
    token: &TokenDescriptor,
    oracle: &dyn PriceOracle,
) -> String {
    match oracle.search(&token.symbol).await {
        Ok(hits) => {
            if let Some(hit) = hits
                .iter()
                .find(|hit| hit.symbol.eq_ignore_ascii_case(&token.symbol))
            {
                debug!("resolved price id for {} via search: {}", token.symbol, hit.id);
                return hit.id.clone();
            }
        }
        Err(e) => {
            warn!(
                "price id search for {} failed, falling back to catalog: {}",
                token.symbol, e
            );
        }
    }

    if let Some(price_id) = catalog
        .find_price_id(&token.symbol)
        .or_else(|| catalog.find_price_id(&token.address_key))
    {
        return price_id.to_string();
    }

    token.symbol.to_lowercase()
}
