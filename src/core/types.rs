//! Core data records shared across the resolution pipeline.
//!
//! The credential bundle is a pure data record: upstream request options are
//! constructed from it at each call site (`upstream::UpstreamClient`), never
//! by mutating the cached value.

use serde::{Deserialize, Serialize};

/// Identity of a tenant: the resolved username plus the cluster name taken
/// verbatim from the request path. All cached state is scoped to this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantKey {
    pub username: String,
    pub cluster: String,
}

impl TenantKey {
    pub fn new<U: Into<String>, C: Into<String>>(username: U, cluster: C) -> Self {
        Self {
            username: username.into(),
            cluster: cluster.into(),
        }
    }

    /// Logical cache key for this tenant's credential bundle.
    pub fn credential_key(&self) -> String {
        format!("clusterCredentials:{}:{}", self.username, self.cluster)
    }

    /// Logical cache key for this tenant's negotiated API version.
    pub fn version_key(&self) -> String {
        format!("clusterVersions:{}:{}", self.username, self.cluster)
    }
}

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.username, self.cluster)
    }
}

/// TLS client credentials and endpoint for one tenant's cluster.
///
/// Produced once by unpacking the remote credential archive, then cached as
/// JSON. Immutable after creation; a bundle is only ever constructed fully
/// populated (`auth::archive` fails extraction otherwise).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBundle {
    pub host: String,
    pub port: u16,
    pub certificate: String,
    pub private_key: String,
    pub ca_certificate: String,
}
