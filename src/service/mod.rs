use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info};

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::rpc::{JsonRpcReceiptOracle, ReceiptOracle};
use crate::verification::{CacheSettings, VerificationCache};

/// Main verification service
pub struct VerificationService {
    config: Arc<Config>,
    cache: Arc<VerificationCache<JsonRpcReceiptOracle>>,
}

impl VerificationService {
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let oracle = JsonRpcReceiptOracle::connect(&config.rpc.url, config.poll_interval()).await?;
        let settings = CacheSettings::new(&config.cache, config.receipt_timeout());
        let cache = Arc::new(VerificationCache::new(oracle, settings));

        Ok(Self {
            config: Arc::new(config),
            cache,
        })
    }

    /// Start the verification service
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!("🚀 Starting txguard verification service");
        info!(
            "🌐 Network: {} (chain id {})",
            self.config.network.name(),
            self.config.network.chain_id()
        );
        info!("📡 RPC endpoint: {}", self.cache.oracle().endpoint());
        info!(
            "🔍 Policy: {} | TTL: {}s | receipt timeout: {:?}",
            self.config.cache.policy.name(),
            self.config.cache.ttl_seconds,
            self.config.receipt_timeout()
        );

        if let Some(every) = self.config.sweep_interval() {
            tokio::spawn(run_expiry_sweep(Arc::clone(&self.cache), every));
        }

        let router = create_router(ApiState {
            cache: Arc::clone(&self.cache),
            network: self.config.network,
        });

        let listener = tokio::net::TcpListener::bind(&self.config.api.bind_address).await?;
        info!("👂 Listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Verification service stopped");
        Ok(())
    }

    pub fn cache(&self) -> Arc<VerificationCache<JsonRpcReceiptOracle>> {
        Arc::clone(&self.cache)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Periodically drop expired records
pub async fn run_expiry_sweep<O: ReceiptOracle>(cache: Arc<VerificationCache<O>>, every: Duration) {
    let mut interval = time::interval(every);

    info!("🧹 Expiry sweep every {:?}", every);

    loop {
        interval.tick().await;

        let purged = cache.purge_expired();
        if purged > 0 {
            info!("Purged {} expired records ({} remaining)", purged, cache.len());
        } else {
            debug!("Expiry sweep found nothing to purge");
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReplayPolicy;

    #[tokio::test]
    async fn test_service_creation() {
        let mut config = Config::default();
        config.rpc.url = "http://127.0.0.1:8545".to_string();

        let service = VerificationService::new(config).await.unwrap();
        let cache = service.cache();
        assert!(cache.is_empty());
        assert_eq!(cache.settings().policy, ReplayPolicy::Reject);
        assert_eq!(cache.settings().ttl_seconds, 3600);
    }

    #[tokio::test]
    async fn test_service_rejects_invalid_config() {
        let mut config = Config::default();
        config.cache.ttl_seconds = 0;

        let service = VerificationService::new(config).await;
        assert!(service.is_err());
    }
}
