//! Control panel API client.
//!
//! Two endpoints are consumed, both authenticated with the opaque
//! `X-Session-Id` header: `GET /session` resolves the session to a user
//! record, and `GET /clusters/{cluster}/credentials` issues a time-limited
//! download URL for the tenant's credential archive.

use crate::core::config::ControlPanelConfig;
use crate::core::error::{GatewayError, GatewayResult};
use serde::Deserialize;
use tracing::{debug, warn};

const SESSION_HEADER: &str = "X-Session-Id";

#[derive(Debug, Deserialize)]
struct SessionBody {
    user: SessionUser,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CredentialsBody {
    zip_url: String,
}

/// Client for the external session and credential-issuance services.
pub struct ControlPanelClient {
    base_url: String,
    http: reqwest::Client,
}

impl ControlPanelClient {
    pub fn new(config: &ControlPanelConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("control panel client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Resolve a session token to a username.
    ///
    /// Any failure here is fatal to the calling request: transport errors,
    /// non-2xx responses and unparsable bodies all surface as
    /// `SessionInvalid`.
    pub async fn session_username(&self, session_id: &str) -> GatewayResult<String> {
        debug!("Resolving control panel session");

        let response = self
            .http
            .get(format!("{}/session", self.base_url))
            .header(SESSION_HEADER, session_id)
            .send()
            .await
            .map_err(|e| GatewayError::session_invalid(format!("session lookup failed: {}", e)))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Session service rejected session");
            return Err(GatewayError::session_invalid(format!(
                "session service returned {}",
                response.status()
            )));
        }

        let body: SessionBody = response
            .json()
            .await
            .map_err(|e| GatewayError::session_invalid(format!("unreadable session body: {}", e)))?;

        Ok(body.user.name)
    }

    /// Request a download URL for the tenant's credential archive.
    pub async fn credentials_url(&self, session_id: &str, cluster: &str) -> GatewayResult<String> {
        debug!(cluster, "Requesting credentials URL");

        let response = self
            .http
            .get(format!("{}/clusters/{}/credentials", self.base_url, cluster))
            .header(SESSION_HEADER, session_id)
            .send()
            .await
            .map_err(|e| GatewayError::credential_fetch(format!("issuance request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatewayError::credential_fetch(format!(
                "issuance service returned {}",
                response.status()
            )));
        }

        let body: CredentialsBody = response.json().await.map_err(|e| {
            GatewayError::credential_fetch(format!("unreadable issuance body: {}", e))
        })?;

        Ok(body.zip_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ControlPanelClient {
        ControlPanelClient::new(&ControlPanelConfig {
            base_url: server.uri(),
            request_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_resolves_username() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .and(header("X-Session-Id", "tok-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"user": {"name": "alice"}})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.session_username("tok-1").await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_rejected_session_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.session_username("bad").await.unwrap_err();
        assert!(matches!(err, GatewayError::SessionInvalid { .. }));
    }

    #[tokio::test]
    async fn test_credentials_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clusters/acme/credentials"))
            .and(header("X-Session-Id", "tok-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"zip_url": "https://files/creds.zip"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.credentials_url("tok-1", "acme").await.unwrap(),
            "https://files/creds.zip"
        );
    }
}
