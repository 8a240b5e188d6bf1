//! Dual-listener server: the HTTP proxy and the WebSocket gateway bind
//! separate ports and shut down together on SIGINT/SIGTERM.

use super::AppState;
use crate::core::error::{GatewayError, GatewayResult};
use crate::protocols::{http, websocket};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Router serving `/{cluster}/{rest...}` proxy traffic.
pub fn proxy_router(state: AppState) -> Router {
    Router::new()
        .fallback(http::proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router serving `/{cluster}/{route}` WebSocket upgrades.
pub fn ws_router(state: AppState) -> Router {
    Router::new()
        .fallback(websocket::ws_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The running gateway: both listeners plus their shared state.
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    pub async fn new(config: crate::core::config::GatewayConfig) -> GatewayResult<Self> {
        let state = AppState::from_config(config).await?;
        Ok(Self { state })
    }

    /// Bind both listeners and serve until a shutdown signal arrives.
    pub async fn run(self) -> GatewayResult<()> {
        let bind = &self.state.config.server.bind_address;
        let proxy_addr = format!("{}:{}", bind, self.state.config.server.proxy_port);
        let ws_addr = format!("{}:{}", bind, self.state.config.server.ws_port);

        let proxy_listener = TcpListener::bind(&proxy_addr).await?;
        let ws_listener = TcpListener::bind(&ws_addr).await?;

        info!(addr = %proxy_addr, "HTTP proxy listening");
        info!(addr = %ws_addr, "WebSocket gateway listening");

        let proxy = axum::serve(proxy_listener, proxy_router(self.state.clone()))
            .with_graceful_shutdown(shutdown_signal("proxy"));
        let ws = axum::serve(ws_listener, ws_router(self.state.clone()))
            .with_graceful_shutdown(shutdown_signal("websocket"));

        tokio::try_join!(
            async { proxy.await.map_err(GatewayError::from) },
            async { ws.await.map_err(GatewayError::from) },
        )?;

        info!("Gateway shut down cleanly");
        Ok(())
    }
}

async fn shutdown_signal(listener: &'static str) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(listener, "Shutdown signal received");
}
