use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// General run settings
    pub system: SystemSettings,

    /// Tracked wallet
    pub wallet: WalletConfig,

    /// Kaia JSON-RPC endpoints
    pub rpc: RpcConfig,

    /// Price oracle REST API
    pub price_oracle: PriceOracleConfig,

    /// Transfer-history discovery providers
    pub discovery: DiscoveryProvidersConfig,

    /// Notion record sink
    pub notion: NotionSinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Minimum delay between successive per-token balance checks in
    /// milliseconds, bounding the outbound request rate
    pub throttle_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Wallet address to snapshot (required)
    pub address: String,

    /// Chain label written into each record
    pub chain_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Ordered RPC endpoint list; balance queries fail over in this order
    pub endpoints: Vec<String>,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceOracleConfig {
    /// Price oracle base URL
    pub api_base_url: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryProvidersConfig {
    /// Ordered provider URL templates with an `{address}` placeholder
    pub provider_urls: Vec<String>,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionSinkConfig {
    /// Notion integration token (required when the sink is enabled)
    pub api_token: String,

    /// Target database id (required when the sink is enabled)
    pub database_id: String,

    /// Notion API base URL
    pub api_base_url: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Disable to log records instead of persisting them
    pub enabled: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system: SystemSettings {
                throttle_delay_ms: 200,
            },
            wallet: WalletConfig {
                address: "".to_string(), // Must be set in .env or config file
                chain_label: "Kaia".to_string(),
            },
            rpc: RpcConfig {
                endpoints: vec![
                    "https://public-en-cypress.klaytn.net".to_string(),
                    "https://rpc.ankr.com/klaytn".to_string(),
                    "https://klaytn-mainnet.gateway.tatum.io".to_string(),
                ],
                request_timeout_seconds: 30,
            },
            price_oracle: PriceOracleConfig {
                api_base_url: "https://api.coingecko.com/api/v3".to_string(),
                request_timeout_seconds: 30,
            },
            discovery: DiscoveryProvidersConfig {
                provider_urls: vec![
                    "https://mainnet-api.kaiascan.io/api/v1/accounts/{address}/token-transfers"
                        .to_string(),
                    "https://api-cypress.klaytnscope.com/v2/accounts/{address}/transfers"
                        .to_string(),
                    "https://api.oklink.com/api/v5/explorer/kaia/token-transfers?address={address}"
                        .to_string(),
                ],
                request_timeout_seconds: 30,
            },
            notion: NotionSinkConfig {
                api_token: "".to_string(), // Must be set in .env or config file
                database_id: "".to_string(),
                api_base_url: "https://api.notion.com".to_string(),
                request_timeout_seconds: 30,
                enabled: true,
            },
        }
    }
}

impl WalletConfig {
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Wallet address is required".to_string(),
            ));
        }
        if self.chain_label.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Chain label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl RpcConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "At least one RPC endpoint is required".to_string(),
            ));
        }
        if self.endpoints.iter().any(|endpoint| endpoint.is_empty()) {
            return Err(ConfigurationError::InvalidValue(
                "RPC endpoint URLs must not be empty".to_string(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl PriceOracleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Price oracle base URL is required".to_string(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl DiscoveryProvidersConfig {
    pub fn validate(&self) -> Result<()> {
        if self.provider_urls.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "At least one discovery provider is required".to_string(),
            ));
        }
        if self.provider_urls.iter().any(|url| url.is_empty()) {
            return Err(ConfigurationError::InvalidValue(
                "Discovery provider URLs must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl NotionSinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.api_token.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Notion API token is required when the sink is enabled".to_string(),
            ));
        }
        if self.enabled && self.database_id.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Notion database id is required when the sink is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        // Add config file if it exists
        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        // Add environment variables with prefix
        config_builder = config_builder.add_source(
            Environment::with_prefix("TRACKER")
                .try_parsing(true)
                .separator("__")
                .list_separator(","),
        );

        let config = config_builder.build()?;
        let system_config: SystemConfig = config.try_deserialize()?;

        system_config.validate()?;

        Ok(system_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.wallet.validate()?;
        self.rpc.validate()?;
        self.price_oracle.validate()?;
        self.discovery.validate()?;
        self.notion.validate()?;
        Ok(())
    }
}

/// Configuration manager for loading and managing system configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: SystemConfig,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Result<Self> {
        let config = SystemConfig::load()?;
        info!("Configuration loaded successfully");
        debug!("Configuration: {:#?}", config);

        Ok(Self { config })
    }

    /// Create configuration manager from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = SystemConfig::load_from_path(path)?;
        Ok(Self { config })
    }

    /// Get a reference to the current configuration
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}
