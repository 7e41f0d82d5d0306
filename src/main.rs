use anyhow::Context;
use chrono::Utc;
use config_manager::ConfigManager;
use discovery_client::{DiscoveryClient, DiscoveryConfig};
use gecko_client::{GeckoClientConfig, GeckoPriceClient};
use kaia_rpc_client::{KaiaRpcClient, KaiaRpcConfig};
use persistence_layer::NotionClient;
use snapshot_core::{build_snapshot, merge_candidates, Catalog};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("💥 wallet snapshot run failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let manager = ConfigManager::new().context("loading configuration")?;
    let config = manager.config();

    info!("🚀 starting Kaia wallet snapshot");
    info!("Wallet: {}", config.wallet.address);
    info!("RPC endpoints: {}", config.rpc.endpoints.len());

    let rpc_client = KaiaRpcClient::new(KaiaRpcConfig {
        endpoints: config.rpc.endpoints.clone(),
        request_timeout_seconds: config.rpc.request_timeout_seconds,
    })
    .context("building RPC client")?;

    let price_client = GeckoPriceClient::new(GeckoClientConfig {
        api_url: config.price_oracle.api_base_url.clone(),
        request_timeout_seconds: config.price_oracle.request_timeout_seconds,
    })
    .context("building price client")?;

    let discovery = DiscoveryClient::new(DiscoveryConfig {
        provider_urls: config.discovery.provider_urls.clone(),
        request_timeout_seconds: config.discovery.request_timeout_seconds,
    })
    .context("building discovery client")?;

    let catalog = Catalog::kaia_mainnet();
    let discovered = discovery.discover_tokens(&config.wallet.address).await;
    info!(
        "{} catalog entries, {} discovered candidates",
        catalog.entries().len(),
        discovered.len()
    );

    let candidates = merge_candidates(&catalog, discovered, &price_client).await;
    info!("{} merged candidates to check", candidates.len());

    let date = Utc::now().date_naive();
    let snapshots = build_snapshot(
        date,
        &config.wallet.address,
        &config.wallet.chain_label,
        &candidates,
        &rpc_client,
        &price_client,
        Duration::from_millis(config.system.throttle_delay_ms),
    )
    .await;

    info!("📊 {} holdings with positive balance", snapshots.len());
    for snapshot in &snapshots {
        info!(
            "  {} {}: {} (${} / ₩{})",
            snapshot.chain_label,
            snapshot.token_symbol,
            snapshot.balance,
            snapshot.total_value_usd,
            snapshot.total_value_krw
        );
    }

    if config.notion.enabled {
        let sink = NotionClient::new(
            &config.notion.api_base_url,
            &config.notion.api_token,
            &config.notion.database_id,
            config.notion.request_timeout_seconds,
        )
        .context("building Notion sink")?;

        for snapshot in &snapshots {
            sink.append_snapshot(snapshot)
                .await
                .with_context(|| format!("appending {} record", snapshot.token_symbol))?;
        }
    } else {
        warn!("Notion sink disabled, records were only logged");
    }

    info!("✨ snapshot run complete");
    Ok(())
}
