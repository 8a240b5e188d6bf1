//! WebSocket gateway.
//!
//! Clients connect to `/{cluster}/logs` and drive the connection with JSON
//! action envelopes. The connection starts unauthenticated: the only action
//! accepted is `auth`, carrying a session token that is resolved through the
//! same credential pipeline as the HTTP proxy. Any other action before a
//! successful `auth` aborts the connection with a single error message.
//! Unparsable messages and unknown actions are dropped silently in every
//! state.
//!
//! After authentication, `addSource`/`removeSource` manage container log
//! follows through the connection's own [`StreamRegistry`]; decoded frames
//! arrive as `logMessage` envelopes.

use crate::core::types::{CredentialBundle, TenantKey};
use crate::gateway::AppState;
use crate::protocols::logs::{self, StreamRegistry};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::Uri;
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Route kinds below the cluster segment. Only log streaming is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Logs,
}

/// Authenticated state for one connection: the tenant, its credential bundle,
/// and the API version negotiated at auth time.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub tenant: TenantKey,
    pub bundle: CredentialBundle,
    pub api_version: String,
}

/// An outbound JSON envelope: `{"action": ..., "data": ...}`.
#[derive(Debug, Clone)]
pub struct ServerMessage {
    pub action: &'static str,
    pub data: Value,
}

impl ServerMessage {
    pub fn auth_success() -> Self {
        Self {
            action: "authSuccess",
            data: json!({}),
        }
    }

    pub fn add_source_failure(container: &str, error: &str) -> Self {
        Self {
            action: "addSourceFailure",
            data: json!({ "container": container, "error": error }),
        }
    }

    pub fn log_message(container: &str, frame: &crate::protocols::frame::LogFrame) -> Self {
        Self {
            action: "logMessage",
            data: json!({
                "container": container,
                "stream": frame.stream,
                "data": frame.data,
            }),
        }
    }

    fn to_json(&self) -> String {
        json!({ "action": self.action, "data": self.data }).to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    action: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct SourcePayload {
    container: String,
}

/// What a handled inbound message means for the connection.
enum Dispatch {
    Continue,
    Abort(&'static str),
}

/// Upgrade handler for `/{cluster}/{route}` WebSocket requests.
///
/// Path problems are only reportable over the socket itself, so the upgrade
/// always succeeds and a bad path aborts immediately after connect.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade, uri: Uri) -> Response {
    let route = parse_socket_path(uri.path());
    ws.on_upgrade(move |socket| handle_socket(state, socket, route))
}

/// Split `/{cluster}/{route}` and validate the route.
fn parse_socket_path(path: &str) -> Result<(String, RouteKind), &'static str> {
    let trimmed = path.trim_start_matches('/');
    let mut parts = trimmed.splitn(2, '/');

    let cluster = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or("clustername not included in original URL")?;
    let route = parts
        .next()
        .map(|s| s.trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .ok_or("No route specified in original URL")?;

    match route {
        "logs" => Ok((cluster.to_string(), RouteKind::Logs)),
        _ => Err("Invalid route specified in original URL"),
    }
}

struct Connection {
    id: Uuid,
    state: AppState,
    cluster: String,
    auth: Option<AuthState>,
    streams: StreamRegistry,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

async fn handle_socket(
    state: AppState,
    mut socket: WebSocket,
    route: Result<(String, RouteKind), &'static str>,
) {
    let (cluster, _route) = match route {
        Ok(route) => route,
        Err(message) => {
            abort(&mut socket, message).await;
            return;
        }
    };

    let id = Uuid::new_v4();
    info!(connection = %id, cluster, "WebSocket connection opened");

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let mut conn = Connection {
        id,
        state,
        cluster,
        auth: None,
        streams: StreamRegistry::new(),
        outbound: outbound_tx,
    };

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match conn.handle_text(&text).await {
                        Dispatch::Continue => {}
                        Dispatch::Abort(message) => {
                            abort(&mut socket, message).await;
                            break;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(connection = %id, error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
            envelope = outbound_rx.recv() => {
                // The sender side never closes before the connection does.
                if let Some(envelope) = envelope {
                    if socket.send(Message::Text(envelope.to_json())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    conn.streams.shutdown();
    info!(connection = %id, "WebSocket connection closed");
}

/// Send the single error envelope and close the socket.
async fn abort(socket: &mut WebSocket, message: &str) {
    let body = json!({ "error": message }).to_string();
    let _ = socket.send(Message::Text(body)).await;
    let _ = socket.send(Message::Close(None)).await;
}

impl Connection {
    async fn handle_text(&mut self, text: &str) -> Dispatch {
        let envelope: ClientEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(_) => {
                debug!(connection = %self.id, "Ignoring unparsable message");
                return Dispatch::Continue;
            }
        };

        if self.auth.is_none() && envelope.action != "auth" {
            warn!(connection = %self.id, action = %envelope.action, "Action before authentication");
            return Dispatch::Abort("Not Authenticated.");
        }

        // Once authenticated, auth is just another unknown action.
        if self.auth.is_some() && envelope.action == "auth" {
            debug!(connection = %self.id, "Ignoring auth on authenticated connection");
            return Dispatch::Continue;
        }

        match envelope.action.as_str() {
            "auth" => self.handle_auth(envelope.data).await,
            "addSource" => self.handle_add_source(envelope.data),
            "removeSource" => self.handle_remove_source(envelope.data),
            other => {
                debug!(connection = %self.id, action = other, "Ignoring unknown action");
            }
        }

        Dispatch::Continue
    }

    /// Resolve the session and negotiate the upstream version. Failure leaves
    /// the connection open and unauthenticated.
    async fn handle_auth(&mut self, data: Value) {
        let payload: AuthPayload = match serde_json::from_value(data) {
            Ok(payload) => payload,
            Err(_) => {
                debug!(connection = %self.id, "auth action without sessionId");
                return;
            }
        };

        let (tenant, bundle) = match self
            .state
            .resolver
            .resolve(&payload.session_id, &self.cluster)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(connection = %self.id, error = %e, "WebSocket authentication failed");
                return;
            }
        };

        let api_version = self.state.negotiator.negotiate(&tenant, &bundle).await;
        info!(connection = %self.id, tenant = %tenant, api_version, "WebSocket authenticated");

        self.auth = Some(AuthState {
            tenant,
            bundle,
            api_version,
        });
        let _ = self.outbound.send(ServerMessage::auth_success());
    }

    fn handle_add_source(&mut self, data: Value) {
        let payload: SourcePayload = match serde_json::from_value(data) {
            Ok(payload) => payload,
            Err(_) => {
                debug!(connection = %self.id, "addSource action without container");
                return;
            }
        };

        // handle_text only dispatches here once authenticated.
        let Some(auth) = self.auth.as_ref() else {
            return;
        };

        if self.streams.contains(&payload.container) {
            debug!(connection = %self.id, container = %payload.container, "Source already followed");
            return;
        }

        let handle = logs::spawn_log_stream(
            auth,
            &self.state.config.upstream,
            &payload.container,
            self.outbound.clone(),
        );
        self.streams.insert(&payload.container, handle);
        debug!(connection = %self.id, container = %payload.container, "Source added");
    }

    fn handle_remove_source(&mut self, data: Value) {
        let payload: SourcePayload = match serde_json::from_value(data) {
            Ok(payload) => payload,
            Err(_) => return,
        };

        let removed = self.streams.remove(&payload.container);
        debug!(connection = %self.id, container = %payload.container, removed, "Source removed");
    }
}
