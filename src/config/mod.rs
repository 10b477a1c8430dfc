use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TxGuardError};
use crate::types::ReplayPolicy;

/// Default liveness window of a verification record (one hour)
pub const DEFAULT_PROOF_TTL_SECONDS: u64 = 3600;

/// EVM network the receipts are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Base,
    BaseSepolia,
}

impl Network {
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Base => "https://mainnet.base.org",
            Network::BaseSepolia => "https://sepolia.base.org",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
        }
    }
}

/// txguard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: Network,
    pub rpc: RpcConfig,
    pub cache: CacheConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    pub receipt_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub policy: ReplayPolicy,
    /// Maximum number of records plus in-flight lookups; 0 means unbounded.
    /// Live records are never evicted, new hashes are refused instead.
    pub capacity: usize,
    /// Seconds between expiry sweeps; 0 disables the sweep.
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_address: String,
}

/// Raw environment overrides, keyed by lowercased variable name.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    proof_ttl: Option<u64>,
    proof_policy: Option<ReplayPolicy>,
    proof_cache_capacity: Option<usize>,
    proof_sweep_interval: Option<u64>,
    network: Option<Network>,
    rpc_url: Option<String>,
    receipt_timeout_ms: Option<u64>,
    receipt_poll_ms: Option<u64>,
    bind_address: Option<String>,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rpc.url.trim().is_empty() {
            return Err(TxGuardError::config("RPC URL required"));
        }

        if self.rpc.receipt_timeout_ms == 0 {
            return Err(TxGuardError::config("Receipt timeout must be > 0"));
        }

        if self.rpc.poll_interval_ms == 0 {
            return Err(TxGuardError::config("Receipt poll interval must be > 0"));
        }

        if self.cache.ttl_seconds == 0 {
            return Err(TxGuardError::config("PROOF_TTL must be > 0"));
        }

        if self.cache.ttl_seconds > i64::MAX as u64 {
            return Err(TxGuardError::config(format!(
                "PROOF_TTL ({}) is out of range",
                self.cache.ttl_seconds
            )));
        }

        if self.api.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(TxGuardError::config(format!(
                "Invalid bind address: {}",
                self.api.bind_address
            )));
        }

        Ok(())
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.receipt_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.rpc.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.cache.sweep_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Switch networks, moving the RPC endpoint along unless it was set explicitly.
    pub fn select_network(&mut self, network: Network) {
        if self.rpc.url == self.network.default_rpc_url() {
            self.rpc.url = network.default_rpc_url().to_string();
        }
        self.network = network;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::base_sepolia()
    }
}

impl Config {
    /// Create Base Sepolia configuration (safer for testing)
    pub fn base_sepolia() -> Self {
        Self::for_network(Network::BaseSepolia)
    }

    /// Create Base mainnet configuration (production)
    pub fn base() -> Self {
        Self::for_network(Network::Base)
    }

    fn for_network(network: Network) -> Self {
        Self {
            network,
            rpc: RpcConfig {
                url: network.default_rpc_url().to_string(),
                receipt_timeout_ms: 30_000,
                poll_interval_ms: 1_000,
            },
            cache: CacheConfig {
                ttl_seconds: DEFAULT_PROOF_TTL_SECONDS,
                policy: ReplayPolicy::Reject,
                capacity: 0,
                sweep_interval_seconds: 0,
            },
            api: ApiConfig {
                bind_address: "0.0.0.0:3000".to_string(),
            },
        }
    }

    /// Load configuration from the process environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_env_source(None)
    }

    /// Load configuration from an explicit variable map, or the process
    /// environment when `source` is `None`.
    pub fn from_env_source(source: Option<config::Map<String, String>>) -> Result<Self> {
        let overrides: EnvOverrides = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .source(source),
            )
            .build()?
            .try_deserialize()?;

        let mut config = Self::for_network(overrides.network.unwrap_or(Network::BaseSepolia));

        if let Some(url) = overrides.rpc_url {
            config.rpc.url = url;
        }
        if let Some(ms) = overrides.receipt_timeout_ms {
            config.rpc.receipt_timeout_ms = ms;
        }
        if let Some(ms) = overrides.receipt_poll_ms {
            config.rpc.poll_interval_ms = ms;
        }
        if let Some(ttl) = overrides.proof_ttl {
            config.cache.ttl_seconds = ttl;
        }
        if let Some(policy) = overrides.proof_policy {
            config.cache.policy = policy;
        }
        if let Some(capacity) = overrides.proof_cache_capacity {
            config.cache.capacity = capacity;
        }
        if let Some(secs) = overrides.proof_sweep_interval {
            config.cache.sweep_interval_seconds = secs;
        }
        if let Some(addr) = overrides.bind_address {
            config.api.bind_address = addr;
        }

        config.validate()?;
        Ok(config)
    }
}
