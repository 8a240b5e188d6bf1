//! Container log stream multiplexer.
//!
//! Each WebSocket connection owns a [`StreamRegistry`] mapping container ids
//! to running follow tasks. A task tails the container's log endpoint over
//! the tenant's mutually-authenticated client and forwards every decoded
//! frame to the connection's outbound channel. Removing a source or tearing
//! down the connection aborts the task, which drops the upstream response and
//! closes the follow request.

use crate::core::config::UpstreamConfig;
use crate::protocols::frame;
use crate::protocols::websocket::{AuthState, ServerMessage};
use crate::upstream::UpstreamClient;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-connection set of running log follow tasks, keyed by container id.
///
/// Not shared between connections; every socket gets its own registry and
/// drops it on close.
#[derive(Default)]
pub struct StreamRegistry {
    streams: HashMap<String, JoinHandle<()>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, container: &str) -> bool {
        self.streams.contains_key(container)
    }

    /// Register a follow task for a container. Adding a container that is
    /// already registered is a no-op and the new handle is aborted.
    pub fn insert(&mut self, container: &str, handle: JoinHandle<()>) {
        if self.streams.contains_key(container) {
            handle.abort();
            return;
        }
        self.streams.insert(container.to_string(), handle);
    }

    /// Stop following a container. Returns whether it was registered;
    /// removing an unknown container is a no-op.
    pub fn remove(&mut self, container: &str) -> bool {
        match self.streams.remove(container) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every running follow task. Called on connection teardown.
    pub fn shutdown(&mut self) {
        for (container, handle) in self.streams.drain() {
            debug!(container, "Aborting log stream");
            handle.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Spawn a follow task tailing one container's logs into the outbound queue.
pub fn spawn_log_stream(
    auth: &AuthState,
    upstream_config: &UpstreamConfig,
    container: &str,
    outbound: UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    let auth = auth.clone();
    let connect_timeout = upstream_config.connect_timeout;
    let tail = upstream_config.log_tail;
    let container = container.to_string();

    tokio::spawn(async move {
        run_log_stream(auth, connect_timeout, tail, container, outbound).await;
    })
}

async fn run_log_stream(
    auth: AuthState,
    connect_timeout: std::time::Duration,
    tail: u32,
    container: String,
    outbound: UnboundedSender<ServerMessage>,
) {
    let upstream = match UpstreamClient::from_bundle(&auth.bundle, connect_timeout) {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!(container, error = %e, "Could not build upstream client for log stream");
            return;
        }
    };

    let url = upstream.url(&format!(
        "v{}/containers/{}/logs?stdout=1&stderr=1&tail={}&follow=1",
        auth.api_version, container, tail
    ));

    let mut response = match upstream.http().get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            // The source stays registered; the client can removeSource and
            // retry.
            warn!(container, error = %e, "Log follow request failed");
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        // One chunk of the error body is the failure payload; dropping the
        // response closes the follow without draining the rest.
        let body = match response.chunk().await {
            Ok(Some(chunk)) => String::from_utf8_lossy(&chunk).into_owned(),
            _ => String::new(),
        };
        warn!(container, %status, "Log follow rejected by cluster");
        let _ = outbound.send(ServerMessage::add_source_failure(&container, &body));
        return;
    }

    debug!(container, "Log stream attached");

    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                let frame = frame::decode(&chunk);
                if outbound
                    .send(ServerMessage::log_message(&container, &frame))
                    .is_err()
                {
                    // Connection is gone; dropping the response closes the
                    // follow.
                    break;
                }
            }
            Err(e) => {
                warn!(container, error = %e, "Log stream read failed");
                break;
            }
        }
    }

    debug!(container, "Log stream ended");
}
