//! Upstream API version negotiation.
//!
//! The cluster API versions its entire surface under `/v{version}/` path
//! prefixes. The negotiator probes the version endpoint through the lowest
//! version the gateway supports, caches the reported version per tenant, and
//! falls back to the floor when the probe fails in any way. The floor
//! fallback is never written to the cache, so a transient probe failure does
//! not pin a tenant to the floor for a full TTL.

use crate::caching::{self, CacheStore};
use crate::core::types::{CredentialBundle, TenantKey};
use crate::upstream::UpstreamClient;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionBody {
    api_version: Option<String>,
}

/// Negotiates and caches the upstream API version per tenant.
pub struct VersionNegotiator {
    cache: Arc<dyn CacheStore>,
    floor_version: String,
    connect_timeout: Duration,
    ttl: Duration,
}

impl VersionNegotiator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        floor_version: impl Into<String>,
        connect_timeout: Duration,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            floor_version: floor_version.into(),
            connect_timeout,
            ttl,
        }
    }

    /// Resolve the API version to use for a tenant's cluster.
    ///
    /// Negotiation is best-effort and infallible: a cache failure is treated
    /// as a miss, and any probe failure yields the floor version.
    pub async fn negotiate(&self, tenant: &TenantKey, bundle: &CredentialBundle) -> String {
        let key = tenant.version_key();

        match caching::get_json::<String>(self.cache.as_ref(), &key).await {
            Ok(Some(version)) => {
                debug!(tenant = %tenant, version, "Returning API version from cache");
                return version;
            }
            Ok(None) => {}
            Err(e) => warn!(tenant = %tenant, error = %e, "Version cache lookup failed"),
        }

        match self.probe(bundle).await {
            Some(version) => {
                debug!(tenant = %tenant, version, "Negotiated upstream API version");
                if let Err(e) =
                    caching::set_json(self.cache.as_ref(), &key, &version, self.ttl).await
                {
                    warn!(tenant = %tenant, error = %e, "Failed to cache API version");
                }
                version
            }
            None => {
                // Not cached: the next request retries negotiation.
                debug!(
                    tenant = %tenant,
                    floor = %self.floor_version,
                    "Version probe failed, assuming floor version"
                );
                self.floor_version.clone()
            }
        }
    }

    async fn probe(&self, bundle: &CredentialBundle) -> Option<String> {
        let upstream = match UpstreamClient::from_bundle(bundle, self.connect_timeout) {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(error = %e, "Could not build upstream client for version probe");
                return None;
            }
        };

        let url = upstream.url(&format!("v{}/version", self.floor_version));
        let response = match upstream.http().get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Version probe request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Version probe rejected");
            return None;
        }

        match response.json::<VersionBody>().await {
            // A readable body that omits the version field still counts as a
            // successful negotiation at the floor.
            Ok(body) => Some(body.api_version.unwrap_or_else(|| self.floor_version.clone())),
            Err(e) => {
                debug!(error = %e, "Version probe body unreadable");
                None
            }
        }
    }
}
