//! Credential archive extraction.
//!
//! The issuance service hands out a zip bundle containing, under an arbitrary
//! top-level directory, the tenant's `ca.pem`, `cert.pem`, `key.pem` and a
//! `docker.env` whose `DOCKER_HOST` line carries the cluster endpoint. The
//! archive is unpacked sequentially from the download stream — one entry
//! resident at a time, non-matching entries drained straight to a sink — so
//! memory stays bounded however large the archive is.
//!
//! Extraction is strict: a bundle missing any of the four credential fields
//! fails with `CredentialBundleIncomplete` instead of being returned partial.

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::CredentialBundle;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::io::Read;
use tokio_util::io::{StreamReader, SyncIoBridge};
use url::Url;

/// Unpack a credential bundle from an archive byte stream.
pub async fn extract_bundle<S, E>(stream: S) -> GatewayResult<CredentialBundle>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let reader = StreamReader::new(Box::pin(
        stream.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    ));

    // The zip reader is synchronous; bridge the async download into a
    // blocking task instead of buffering the whole archive.
    let bridge = SyncIoBridge::new(reader);
    tokio::task::spawn_blocking(move || extract_blocking(bridge))
        .await
        .map_err(|e| GatewayError::internal(format!("archive extraction task failed: {}", e)))?
}

fn extract_blocking<R: Read>(mut reader: R) -> GatewayResult<CredentialBundle> {
    let mut parts = BundleParts::default();

    loop {
        match zip::read::read_zipfile_from_stream(&mut reader) {
            Ok(Some(mut entry)) => {
                let name = entry.name().to_string();
                if let Some(slot) = BundleSlot::for_entry(&name) {
                    let mut contents = String::new();
                    entry.read_to_string(&mut contents).map_err(|e| {
                        GatewayError::credential_fetch(format!(
                            "unreadable archive entry {}: {}",
                            name, e
                        ))
                    })?;
                    parts.fill(slot, &contents)?;
                } else {
                    // Skip to the next entry without retaining the contents.
                    std::io::copy(&mut entry, &mut std::io::sink()).map_err(|e| {
                        GatewayError::credential_fetch(format!(
                            "unreadable archive entry {}: {}",
                            name, e
                        ))
                    })?;
                }
            }
            Ok(None) => break,
            Err(e) => {
                return Err(GatewayError::credential_fetch(format!(
                    "unreadable credential archive: {}",
                    e
                )))
            }
        }
    }

    parts.into_bundle()
}

/// The bundle fields an archive entry can populate, selected by path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BundleSlot {
    CaCertificate,
    Certificate,
    PrivateKey,
    Endpoint,
}

impl BundleSlot {
    fn for_entry(name: &str) -> Option<Self> {
        if name.ends_with("/ca.pem") {
            Some(Self::CaCertificate)
        } else if name.ends_with("/cert.pem") {
            Some(Self::Certificate)
        } else if name.ends_with("/key.pem") {
            Some(Self::PrivateKey)
        } else if name.ends_with("/docker.env") {
            Some(Self::Endpoint)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct BundleParts {
    ca_certificate: Option<String>,
    certificate: Option<String>,
    private_key: Option<String>,
    endpoint: Option<(String, u16)>,
}

impl BundleParts {
    fn fill(&mut self, slot: BundleSlot, contents: &str) -> GatewayResult<()> {
        match slot {
            BundleSlot::CaCertificate => self.ca_certificate = Some(contents.to_string()),
            BundleSlot::Certificate => self.certificate = Some(contents.to_string()),
            BundleSlot::PrivateKey => self.private_key = Some(contents.to_string()),
            BundleSlot::Endpoint => self.endpoint = Some(parse_docker_host(contents)?),
        }
        Ok(())
    }

    fn into_bundle(self) -> GatewayResult<CredentialBundle> {
        match (
            self.ca_certificate,
            self.certificate,
            self.private_key,
            self.endpoint,
        ) {
            (Some(ca_certificate), Some(certificate), Some(private_key), Some((host, port))) => {
                Ok(CredentialBundle {
                    host,
                    port,
                    certificate,
                    private_key,
                    ca_certificate,
                })
            }
            (ca, cert, key, endpoint) => {
                let mut missing = Vec::new();
                if ca.is_none() {
                    missing.push("caCertificate");
                }
                if cert.is_none() {
                    missing.push("certificate");
                }
                if key.is_none() {
                    missing.push("privateKey");
                }
                if endpoint.is_none() {
                    missing.push("host/port");
                }
                Err(GatewayError::CredentialBundleIncomplete {
                    missing: missing.join(", "),
                })
            }
        }
    }
}

/// Parse the `DOCKER_HOST=scheme://host:port` line out of a docker.env file.
fn parse_docker_host(contents: &str) -> GatewayResult<(String, u16)> {
    let line = contents
        .lines()
        .find_map(|line| line.trim().strip_prefix("DOCKER_HOST="))
        .ok_or_else(|| GatewayError::credential_fetch("docker.env has no DOCKER_HOST entry"))?;

    let url = Url::parse(line.trim())
        .map_err(|e| GatewayError::credential_fetch(format!("invalid DOCKER_HOST url: {}", e)))?;

    let host = url
        .host_str()
        .ok_or_else(|| GatewayError::credential_fetch("DOCKER_HOST url has no host"))?
        .to_string();
    let port = url
        .port()
        .ok_or_else(|| GatewayError::credential_fetch("DOCKER_HOST url has no port"))?;

    Ok((host, port))
}
