use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use txguard::{Config, Network, VerificationService};

#[tokio::main]
async fn main() -> txguard::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // Load configuration from the environment
    let mut config = Config::from_env()?;

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "base" {
        config.select_network(Network::Base);
    }

    match config.network {
        Network::Base => tracing::warn!("Running on BASE MAINNET - this is PRODUCTION!"),
        Network::BaseSepolia => tracing::info!("Running on BASE SEPOLIA - safe for testing"),
    }

    // Create and run service
    let service = Arc::new(VerificationService::new(config).await?);
    service.run().await
}
