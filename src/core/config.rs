//! # Configuration Module
//!
//! Configuration structures and loading for the gateway. Supports YAML files
//! parsed with serde, `GATEWAY_*` environment variable overrides, and
//! validation with detailed error messages.

use crate::core::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, proxy port, WebSocket port)
    pub server: ServerConfig,

    /// Control panel endpoints (session lookup, credential issuance)
    pub control_panel: ControlPanelConfig,

    /// Credential/version cache settings
    pub cache: CacheConfig,

    /// Upstream cluster API settings
    pub upstream: UpstreamConfig,

    /// Logging settings
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            control_panel: ControlPanelConfig::default(),
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
///
/// The HTTP proxy and the WebSocket gateway bind separate ports, mirroring
/// the split between plain request/response traffic and long-lived log
/// streaming connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub proxy_port: u16,
    pub ws_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            proxy_port: 8080,
            ws_port: 8081,
        }
    }
}

/// Control panel client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPanelConfig {
    /// Base URL of the control panel API
    pub base_url: String,

    /// Timeout for session and credential-URL requests
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ControlPanelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

/// Credential/version cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Redis connection URL (ignored for the memory backend)
    pub redis_url: String,

    /// Prefix prepended to every stored key
    pub key_prefix: String,

    /// Time-to-live for credential bundles and negotiated versions
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "users:".to_string(),
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Upstream cluster API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Lowest API version assumed safe when negotiation cannot complete
    pub floor_version: String,

    /// TCP connect timeout for upstream requests
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Number of trailing log lines requested when a log stream opens
    pub log_tail: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            floor_version: "1.14".to_string(),
            connect_timeout: Duration::from_secs(10),
            log_tail: 40,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file, apply environment overrides, and
    /// validate the result.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from defaults plus environment overrides only.
    pub fn from_env() -> GatewayResult<Self> {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Variables follow the pattern `GATEWAY_<SECTION>_<FIELD>`, for example
    /// `GATEWAY_SERVER_PROXY_PORT=8080`.
    pub fn apply_env_overrides(&mut self) -> GatewayResult<()> {
        use std::env;

        if let Ok(addr) = env::var("GATEWAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Ok(port) = env::var("GATEWAY_SERVER_PROXY_PORT") {
            self.server.proxy_port = port
                .parse()
                .map_err(|e| GatewayError::config(format!("Invalid GATEWAY_SERVER_PROXY_PORT: {}", e)))?;
        }

        if let Ok(port) = env::var("GATEWAY_SERVER_WS_PORT") {
            self.server.ws_port = port
                .parse()
                .map_err(|e| GatewayError::config(format!("Invalid GATEWAY_SERVER_WS_PORT: {}", e)))?;
        }

        if let Ok(url) = env::var("GATEWAY_CONTROL_PANEL_URL") {
            self.control_panel.base_url = url;
        }

        if let Ok(url) = env::var("GATEWAY_CACHE_REDIS_URL") {
            self.cache.redis_url = url;
        }

        if let Ok(backend) = env::var("GATEWAY_CACHE_BACKEND") {
            self.cache.backend = match backend.to_lowercase().as_str() {
                "memory" => CacheBackend::Memory,
                "redis" => CacheBackend::Redis,
                other => {
                    return Err(GatewayError::config(format!(
                        "Invalid GATEWAY_CACHE_BACKEND: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(level) = env::var("GATEWAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(format) = env::var("GATEWAY_LOG_FORMAT") {
            self.observability.log_format = match format.to_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(GatewayError::config(format!(
                        "Invalid GATEWAY_LOG_FORMAT: {}",
                        other
                    )))
                }
            };
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.server.proxy_port == 0 {
            return Err(GatewayError::config("server.proxy_port must be non-zero"));
        }

        if self.server.ws_port == 0 {
            return Err(GatewayError::config("server.ws_port must be non-zero"));
        }

        if self.server.proxy_port == self.server.ws_port {
            return Err(GatewayError::config(
                "server.proxy_port and server.ws_port must differ",
            ));
        }

        Url::parse(&self.control_panel.base_url).map_err(|e| {
            GatewayError::config(format!("control_panel.base_url is not a valid URL: {}", e))
        })?;

        if self.cache.backend == CacheBackend::Redis {
            Url::parse(&self.cache.redis_url).map_err(|e| {
                GatewayError::config(format!("cache.redis_url is not a valid URL: {}", e))
            })?;
        }

        if self.cache.ttl.as_secs() == 0 {
            return Err(GatewayError::config("cache.ttl must be at least one second"));
        }

        if self.upstream.floor_version.is_empty() {
            return Err(GatewayError::config("upstream.floor_version must be set"));
        }

        Ok(())
    }
}
