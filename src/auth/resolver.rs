//! Credential resolver.
//!
//! Resolves an opaque session token to a tenant identity and its TLS
//! credential bundle: session lookup, cache-first bundle retrieval, and on a
//! miss a fetch-unpack-store round through the issuance service.
//!
//! Concurrent misses for the same tenant are coalesced: the first caller
//! becomes the leader and performs the fetch, later callers subscribe to the
//! leader's broadcast and receive the same result, so a cold cache never
//! triggers redundant archive downloads for one tenant.

use crate::auth::archive;
use crate::auth::control_panel::ControlPanelClient;
use crate::caching::{self, CacheStore};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{CredentialBundle, TenantKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

type FlightResult = Result<CredentialBundle, GatewayError>;

/// Resolves session tokens to cached or freshly fetched credential bundles.
pub struct CredentialResolver {
    control_panel: Arc<ControlPanelClient>,
    cache: Arc<dyn CacheStore>,
    http: reqwest::Client,
    ttl: Duration,
    in_flight: DashMap<String, broadcast::Sender<FlightResult>>,
}

impl CredentialResolver {
    pub fn new(
        control_panel: Arc<ControlPanelClient>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            control_panel,
            cache,
            http: reqwest::Client::new(),
            ttl,
            in_flight: DashMap::new(),
        }
    }

    /// Resolve a session token and cluster name to the tenant identity and
    /// its credential bundle.
    ///
    /// The session is re-resolved on every call; only the bundle is cached.
    pub async fn resolve(
        &self,
        session_id: &str,
        cluster: &str,
    ) -> GatewayResult<(TenantKey, CredentialBundle)> {
        let username = self.control_panel.session_username(session_id).await?;
        let tenant = TenantKey::new(username, cluster);
        let key = tenant.credential_key();

        match caching::get_json::<CredentialBundle>(self.cache.as_ref(), &key).await {
            Ok(Some(bundle)) => {
                debug!(tenant = %tenant, "Returning credentials from cache");
                return Ok((tenant, bundle));
            }
            Ok(None) => debug!(tenant = %tenant, "No stored credentials found"),
            Err(e) => warn!(tenant = %tenant, error = %e, "Credential cache lookup failed"),
        }

        // Join an in-flight fetch for this tenant if one exists, otherwise
        // become the leader.
        let waiter = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => Some(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx);
                None
            }
        };

        if let Some(mut rx) = waiter {
            debug!(tenant = %tenant, "Joining in-flight credential fetch");
            let bundle = rx
                .recv()
                .await
                .map_err(|_| GatewayError::internal("credential fetch leader vanished"))??;
            return Ok((tenant, bundle));
        }

        let result = self.fetch_and_store(&tenant, session_id).await;
        if let Some((_, tx)) = self.in_flight.remove(&key) {
            // No receivers is fine: nobody else asked while we fetched.
            let _ = tx.send(result.clone());
        }

        result.map(|bundle| (tenant, bundle))
    }

    async fn fetch_and_store(&self, tenant: &TenantKey, session_id: &str) -> FlightResult {
        let zip_url = self
            .control_panel
            .credentials_url(session_id, &tenant.cluster)
            .await?;

        debug!(tenant = %tenant, "Downloading credentials archive");
        let response = self
            .http
            .get(&zip_url)
            .send()
            .await
            .map_err(|e| GatewayError::credential_fetch(format!("archive download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::credential_fetch(format!(
                "archive download returned {}",
                response.status()
            )));
        }

        let bundle = archive::extract_bundle(response.bytes_stream()).await?;

        let key = tenant.credential_key();
        if let Err(e) =
            caching::set_json(self.cache.as_ref(), &key, &bundle, self.ttl).await
        {
            // The bundle is still usable; the next request will re-fetch.
            warn!(tenant = %tenant, error = %e, "Failed to cache credential bundle");
        } else {
            info!(tenant = %tenant, host = %bundle.host, "Credential bundle resolved and cached");
        }

        Ok(bundle)
    }
}
