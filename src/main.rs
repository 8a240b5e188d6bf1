//! # Cluster Gateway - Main Entry Point
//!
//! Loads configuration (YAML file via `GATEWAY_CONFIG_PATH`, or defaults plus
//! `GATEWAY_*` environment overrides), installs logging, and runs the two
//! gateway listeners until a shutdown signal arrives.

use cluster_gateway::{observability, GatewayConfig, GatewayResult, GatewayServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> GatewayResult<()> {
    let config = load_config().await?;

    observability::init(&config.observability);

    info!("🚀 Starting cluster gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        control_panel = %config.control_panel.base_url,
        cache_backend = ?config.cache.backend,
        "Configuration loaded"
    );

    let server = match GatewayServer::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start gateway: {}", e);
            std::process::exit(1);
        }
    };

    server.run().await?;

    info!("✅ Cluster gateway shutdown complete");
    Ok(())
}

async fn load_config() -> GatewayResult<GatewayConfig> {
    match std::env::var("GATEWAY_CONFIG_PATH") {
        Ok(path) => GatewayConfig::load_from_file(&path).await,
        Err(_) => GatewayConfig::from_env(),
    }
}
