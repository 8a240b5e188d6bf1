//! Upstream cluster API access.
//!
//! Every upstream request is made with a TLS client built from the tenant's
//! own credential bundle: client certificate plus private key for mutual TLS
//! and the bundle's CA as the sole trust root. Clients are constructed per
//! request path from the cached bundle rather than pooled per tenant.

pub mod version;

pub use version::VersionNegotiator;

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::CredentialBundle;
use std::time::Duration;

/// An HTTPS client bound to one tenant's cluster endpoint.
#[derive(Debug)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Build a mutually-authenticated client for the bundle's endpoint.
    pub fn from_bundle(bundle: &CredentialBundle, connect_timeout: Duration) -> GatewayResult<Self> {
        let identity_pem = format!("{}\n{}", bundle.certificate, bundle.private_key);
        let identity = reqwest::Identity::from_pem(identity_pem.as_bytes())
            .map_err(|e| GatewayError::credential_fetch(format!("invalid client identity: {}", e)))?;
        let ca = reqwest::Certificate::from_pem(bundle.ca_certificate.as_bytes())
            .map_err(|e| GatewayError::credential_fetch(format!("invalid CA certificate: {}", e)))?;

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .add_root_certificate(ca)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                GatewayError::upstream_transport(format!("upstream client build failed: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: format!("https://{}:{}", bundle.host, bundle.port),
        })
    }

    /// Absolute URL for a path-and-query below the cluster root.
    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.base_url, path_and_query.trim_start_matches('/'))
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
