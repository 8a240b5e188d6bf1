//! Gateway assembly: shared application state, routers, and the dual-listener
//! server with graceful shutdown.

pub mod server;

pub use server::GatewayServer;

use crate::auth::{ControlPanelClient, CredentialResolver};
use crate::caching::CacheStore;
use crate::core::config::{CacheBackend, GatewayConfig};
use crate::core::error::GatewayResult;
use crate::upstream::VersionNegotiator;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub resolver: Arc<CredentialResolver>,
    pub negotiator: Arc<VersionNegotiator>,
}

impl AppState {
    /// Wire up the cache backend, control panel client, resolver and version
    /// negotiator from configuration.
    pub async fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        let cache: Arc<dyn CacheStore> = match config.cache.backend {
            CacheBackend::Memory => Arc::new(crate::caching::InMemoryCache::new()),
            CacheBackend::Redis => Arc::new(
                crate::caching::RedisCache::connect(&config.cache.redis_url, &config.cache.key_prefix)
                    .await?,
            ),
        };

        Self::with_cache(config, cache)
    }

    /// Assemble state around an existing cache store. Used directly by tests
    /// that want a fresh in-memory cache per case.
    pub fn with_cache(config: GatewayConfig, cache: Arc<dyn CacheStore>) -> GatewayResult<Self> {
        let control_panel = Arc::new(ControlPanelClient::new(&config.control_panel)?);

        let resolver = Arc::new(CredentialResolver::new(
            control_panel,
            cache.clone(),
            config.cache.ttl,
        ));

        let negotiator = Arc::new(VersionNegotiator::new(
            cache,
            config.upstream.floor_version.clone(),
            config.upstream.connect_timeout,
            config.cache.ttl,
        ));

        Ok(Self {
            config: Arc::new(config),
            resolver,
            negotiator,
        })
    }
}
