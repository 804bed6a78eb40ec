//! Core configuration structures for Unite settlement services

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use unite_types::Timelocks;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    /// Chain configurations by chain ID
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,

    #[serde(default)]
    pub auction: AuctionConfig,

    #[serde(default)]
    pub timelocks: TimelockConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Network environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Environment type (mainnet, testnet, local)
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Port of the HTTP order API
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Mainnet,
    Testnet,
    Local,
}

/// Configuration for one chain reachable through a chain adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,

    pub rpc_url: String,

    /// How often escrow state is polled while awaiting funding
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Defaults applied when building new orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    #[serde(default = "default_auction_duration_secs")]
    pub default_duration_secs: u64,
}

/// Escrow timelock offsets, seconds from escrow creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockConfig {
    /// End of the resolver's exclusive withdrawal window
    #[serde(default = "default_withdrawal_secs")]
    pub withdrawal_secs: u64,

    /// End of the public withdrawal window
    #[serde(default = "default_public_withdrawal_secs")]
    pub public_withdrawal_secs: u64,

    /// End of the depositor-only cancellation window
    #[serde(default = "default_cancellation_secs")]
    pub cancellation_secs: u64,
}

impl TimelockConfig {
    pub fn timelocks(&self) -> Timelocks {
        Timelocks::new(
            self.withdrawal_secs,
            self.public_withdrawal_secs,
            self.cancellation_secs,
        )
    }
}

/// Which order store the coordinator runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Time a committed resolver has to get both escrows funded
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Escrow confirmation polling interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between expiry / cancellation sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_store_backend")]
    pub store: StoreBackend,

    /// SQLite database file, used when `store = "sqlite"`
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl CoordinatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Address commitments and escrows are made under
    #[serde(default)]
    pub address: String,

    /// Chains this resolver can deploy escrows on
    #[serde(default)]
    pub supported_chains: Vec<String>,

    /// Minimum margin between quote and auction price, in basis points
    #[serde(default = "default_min_profit_bps")]
    pub min_profit_bps: u64,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Safety deposit posted with each escrow, in basis points of the amount
    #[serde(default = "default_safety_deposit_bps")]
    pub safety_deposit_bps: u16,
}

// Default value functions
fn default_environment() -> Environment {
    Environment::Local
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_api_port() -> u16 {
    8000
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_max_retries() -> u32 {
    3
}

fn default_auction_duration_secs() -> u64 {
    300 // 5 minutes
}

fn default_withdrawal_secs() -> u64 {
    600
}

fn default_public_withdrawal_secs() -> u64 {
    1200
}

fn default_cancellation_secs() -> u64 {
    1800
}

fn default_grace_period_secs() -> u64 {
    300 // 5 minutes
}

fn default_sweep_interval_secs() -> u64 {
    10
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_database_path() -> String {
    "unite.db".to_string()
}

fn default_min_profit_bps() -> u64 {
    10 // 0.1%
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30000
}

fn default_safety_deposit_bps() -> u16 {
    500 // 5%
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
            metrics_port: default_metrics_port(),
            api_port: default_api_port(),
        }
    }
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_auction_duration_secs(),
        }
    }
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            withdrawal_secs: default_withdrawal_secs(),
            public_withdrawal_secs: default_public_withdrawal_secs(),
            cancellation_secs: default_cancellation_secs(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            store: default_store_backend(),
            database_path: default_database_path(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            supported_chains: Vec::new(),
            min_profit_bps: default_min_profit_bps(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            safety_deposit_bps: default_safety_deposit_bps(),
        }
    }
}

impl AppConfig {
    /// Two local chains, in-memory store, one resolver
    pub fn local() -> Self {
        let mut config = Self {
            resolver: ResolverConfig {
                address: "resolver-local".to_string(),
                supported_chains: vec!["base-sepolia".to_string(), "aptos-testnet".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        config.add_chain("base-sepolia", "http://localhost:8545");
        config.add_chain("aptos-testnet", "http://localhost:8080");
        config
    }

    /// Public testnet endpoints with a SQLite store
    pub fn testnet() -> Self {
        let mut config = Self {
            network: NetworkConfig {
                environment: Environment::Testnet,
                ..Default::default()
            },
            coordinator: CoordinatorConfig {
                store: StoreBackend::Sqlite,
                ..Default::default()
            },
            ..Default::default()
        };
        config.add_chain("base-sepolia", "https://sepolia.base.org");
        config.add_chain("aptos-testnet", "https://fullnode.testnet.aptoslabs.com/v1");
        config
    }

    fn add_chain(&mut self, chain_id: &str, rpc_url: &str) {
        self.chains.insert(
            chain_id.to_string(),
            ChainConfig {
                chain_id: chain_id.to_string(),
                rpc_url: rpc_url.to_string(),
                poll_interval_ms: default_poll_interval_ms(),
                timeout_ms: default_timeout_ms(),
                max_retries: default_max_retries(),
            },
        );
    }
}
