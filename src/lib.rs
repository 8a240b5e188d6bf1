//! # Cluster Gateway Library
//!
//! A session-authenticated gateway in front of per-tenant container cluster
//! APIs. The gateway resolves opaque session tokens through an external
//! control panel, caches each tenant's TLS credential bundle, negotiates the
//! upstream API version, and exposes two surfaces:
//!
//! - an HTTP proxy that replays `/{cluster}/{rest...}` requests against the
//!   tenant's cluster API over mutual TLS, and
//! - a WebSocket gateway that multiplexes live container log streams onto a
//!   single connection.

/// Core functionality: error types, configuration, and shared data records.
pub mod core;

/// Authentication: control panel client, credential archive unpacking, and
/// the cached credential resolver.
pub mod auth;

/// TTL caching for credential bundles and negotiated API versions.
pub mod caching;

/// Gateway assembly: shared state, routers, and the dual-listener server.
pub mod gateway;

/// Logging setup.
pub mod observability;

/// Protocol surfaces: HTTP proxy, WebSocket gateway, log stream multiplexer,
/// and the log frame codec.
pub mod protocols;

/// Upstream cluster API access and version negotiation.
pub mod upstream;

pub use crate::core::config::GatewayConfig;
pub use crate::core::error::{GatewayError, GatewayResult};
pub use crate::core::types::{CredentialBundle, TenantKey};
pub use crate::gateway::{AppState, GatewayServer};
