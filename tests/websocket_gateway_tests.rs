//! WebSocket gateway tests.
//!
//! The real ws router is served on an ephemeral port and exercised with a
//! tungstenite client, with the control panel mocked. The log streaming cases
//! stand up a minimal mutual-TLS cluster endpoint so `addSource` can be
//! driven end to end.

mod support;

use cluster_gateway::caching::InMemoryCache;
use cluster_gateway::core::config::{CacheBackend, GatewayConfig};
use cluster_gateway::gateway::server::ws_router;
use cluster_gateway::gateway::AppState;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve the ws router on an ephemeral port; returns its base ws:// URL.
async fn spawn_gateway(control_panel_url: String) -> String {
    let mut config = GatewayConfig::default();
    config.control_panel.base_url = control_panel_url;
    config.cache.backend = CacheBackend::Memory;
    config.upstream.connect_timeout = Duration::from_millis(500);

    let state = AppState::with_cache(config, Arc::new(InMemoryCache::new())).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, ws_router(state)).await.unwrap();
    });

    format!("ws://{}", addr)
}

async fn connect(base: &str, path: &str) -> Socket {
    let (socket, _) = connect_async(format!("{}{}", base, path)).await.unwrap();
    socket
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .unwrap();
}

/// Read frames until a text message arrives, with a timeout.
async fn next_json(socket: &mut Socket) -> Value {
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = socket.next().await {
            if let Message::Text(text) = msg.unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
        panic!("socket closed before a text message arrived");
    });
    deadline.await.expect("timed out waiting for a message")
}

/// Wait for the server to close the connection.
async fn expect_close(socket: &mut Socket) {
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = socket.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return,
                _ => {}
            }
        }
    });
    deadline.await.expect("timed out waiting for close");
}

/// Assert no text frame arrives within the window.
async fn expect_silence(socket: &mut Socket, window: Duration) {
    let result = tokio::time::timeout(window, socket.next()).await;
    if let Ok(Some(Ok(Message::Text(text)))) = result {
        panic!("expected no message, got: {}", text);
    }
}

async fn mount_control_panel(server: &MockServer, archive: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"user": {"name": "alice"}})),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/clusters/acme/credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"zip_url": format!("{}/bundle.zip", server.uri())}),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bundle.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(server)
        .await;
}

/// Connect and authenticate against a gateway whose bundle points nowhere.
async fn dead_upstream_gateway() -> String {
    let control_panel = MockServer::start().await;
    mount_control_panel(
        &control_panel,
        support::credentials_zip("CA", "CERT", "KEY", 1),
    )
    .await;
    spawn_gateway(control_panel.uri()).await
}

#[tokio::test]
async fn test_action_before_auth_aborts() {
    let base = dead_upstream_gateway().await;

    let mut socket = connect(&base, "/acme/logs").await;
    send_json(
        &mut socket,
        json!({"action": "addSource", "data": {"container": "abc"}}),
    )
    .await;

    let message = next_json(&mut socket).await;
    assert_eq!(message["error"], "Not Authenticated.");
    expect_close(&mut socket).await;
}

#[tokio::test]
async fn test_malformed_json_is_ignored() {
    let base = dead_upstream_gateway().await;

    let mut socket = connect(&base, "/acme/logs").await;
    socket
        .send(Message::Text("this is not json".to_string()))
        .await
        .unwrap();

    // The connection survived the garbage: the next unauthenticated action
    // still gets the abort message rather than a dead socket.
    send_json(&mut socket, json!({"action": "removeSource", "data": {}})).await;
    let message = next_json(&mut socket).await;
    assert_eq!(message["error"], "Not Authenticated.");
}

#[tokio::test]
async fn test_unknown_route_aborts_on_connect() {
    let base = dead_upstream_gateway().await;

    let mut socket = connect(&base, "/acme/exec").await;
    let message = next_json(&mut socket).await;
    assert_eq!(message["error"], "Invalid route specified in original URL");
    expect_close(&mut socket).await;
}

#[tokio::test]
async fn test_missing_route_aborts_on_connect() {
    let base = dead_upstream_gateway().await;

    let mut socket = connect(&base, "/acme").await;
    let message = next_json(&mut socket).await;
    assert_eq!(message["error"], "No route specified in original URL");
    expect_close(&mut socket).await;
}

#[tokio::test]
async fn test_auth_success() {
    let base = dead_upstream_gateway().await;

    let mut socket = connect(&base, "/acme/logs").await;
    send_json(
        &mut socket,
        json!({"action": "auth", "data": {"sessionId": "tok-1"}}),
    )
    .await;

    let message = next_json(&mut socket).await;
    assert_eq!(message["action"], "authSuccess");
}

#[tokio::test]
async fn test_failed_auth_leaves_connection_unauthenticated() {
    let control_panel = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&control_panel)
        .await;
    let base = spawn_gateway(control_panel.uri()).await;

    let mut socket = connect(&base, "/acme/logs").await;
    send_json(
        &mut socket,
        json!({"action": "auth", "data": {"sessionId": "bad"}}),
    )
    .await;

    // No authSuccess arrives; the connection stays open but unauthenticated,
    // so the next non-auth action aborts it.
    send_json(
        &mut socket,
        json!({"action": "addSource", "data": {"container": "abc"}}),
    )
    .await;
    let message = next_json(&mut socket).await;
    assert_eq!(message["error"], "Not Authenticated.");
    expect_close(&mut socket).await;
}

#[tokio::test]
async fn test_repeated_auth_is_ignored_once_authenticated() {
    let base = dead_upstream_gateway().await;

    let mut socket = connect(&base, "/acme/logs").await;
    send_json(
        &mut socket,
        json!({"action": "auth", "data": {"sessionId": "tok-1"}}),
    )
    .await;
    let message = next_json(&mut socket).await;
    assert_eq!(message["action"], "authSuccess");

    // A second auth on an authenticated connection is dropped like any other
    // unknown action: no re-resolution, no second authSuccess.
    send_json(
        &mut socket,
        json!({"action": "auth", "data": {"sessionId": "tok-1"}}),
    )
    .await;
    expect_silence(&mut socket, Duration::from_millis(500)).await;
}

#[tokio::test]
async fn test_add_source_streams_log_frames() {
    let tls = support::mint_certificates();
    let upstream = support::spawn_tls_upstream(&tls).await;

    let control_panel = MockServer::start().await;
    mount_control_panel(
        &control_panel,
        support::credentials_zip(
            &tls.ca_pem,
            &tls.client_cert_pem,
            &tls.client_key_pem,
            upstream.port,
        ),
    )
    .await;
    let base = spawn_gateway(control_panel.uri()).await;

    let mut socket = connect(&base, "/acme/logs").await;
    send_json(
        &mut socket,
        json!({"action": "auth", "data": {"sessionId": "tok-1"}}),
    )
    .await;
    assert_eq!(next_json(&mut socket).await["action"], "authSuccess");

    send_json(
        &mut socket,
        json!({"action": "addSource", "data": {"container": "web"}}),
    )
    .await;

    let message = next_json(&mut socket).await;
    assert_eq!(message["action"], "logMessage");
    assert_eq!(message["data"]["container"], "web");
    assert_eq!(message["data"]["stream"], "stdout");
    assert_eq!(message["data"]["data"], "hello");
}

#[tokio::test]
async fn test_rejected_follow_reports_add_source_failure() {
    let tls = support::mint_certificates();
    let upstream = support::spawn_tls_upstream(&tls).await;

    let control_panel = MockServer::start().await;
    mount_control_panel(
        &control_panel,
        support::credentials_zip(
            &tls.ca_pem,
            &tls.client_cert_pem,
            &tls.client_key_pem,
            upstream.port,
        ),
    )
    .await;
    let base = spawn_gateway(control_panel.uri()).await;

    let mut socket = connect(&base, "/acme/logs").await;
    send_json(
        &mut socket,
        json!({"action": "auth", "data": {"sessionId": "tok-1"}}),
    )
    .await;
    assert_eq!(next_json(&mut socket).await["action"], "authSuccess");

    send_json(
        &mut socket,
        json!({"action": "addSource", "data": {"container": "missing"}}),
    )
    .await;

    let message = next_json(&mut socket).await;
    assert_eq!(message["action"], "addSourceFailure");
    assert_eq!(message["data"]["container"], "missing");
    assert!(message["data"]["error"]
        .as_str()
        .unwrap()
        .contains("No such container"));
}
