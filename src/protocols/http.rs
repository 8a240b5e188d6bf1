//! HTTP proxy surface.
//!
//! Routes `/{cluster}/{rest...}` requests through credential resolution and
//! version negotiation, then replays them against the tenant's cluster API as
//! `/v{version}/{rest...}` over mutual TLS. Method, query string, headers and
//! body stream through unchanged in both directions; only hop-by-hop headers
//! are stripped from the upstream response.
//!
//! The proxy and the upstream client sit on different `http` crate major
//! versions, so methods, statuses and header pairs cross the boundary by
//! their byte representations rather than by type conversion.

use crate::core::error::{GatewayError, GatewayResult};
use crate::gateway::AppState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

const SESSION_HEADER: &str = "x-session-id";

/// Response headers that describe the gateway-to-upstream connection rather
/// than the payload, dropped instead of forwarded.
const HOP_BY_HOP: &[&str] = &["connection", "keep-alive", "transfer-encoding"];

/// Fallback handler that proxies any request below `/{cluster}/...`.
pub async fn proxy_handler(State(state): State<AppState>, req: Request) -> Response {
    match proxy_request(state, req).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "Proxy request aborted");
            err.into_response()
        }
    }
}

async fn proxy_request(state: AppState, req: Request) -> GatewayResult<Response> {
    let session_id = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::session_invalid("missing x-session-id header"))?;

    let (cluster, rest) = parse_proxy_path(req.uri().path())?;
    let query = req.uri().query().map(str::to_string);

    let (tenant, bundle) = state.resolver.resolve(&session_id, &cluster).await?;
    let version = state.negotiator.negotiate(&tenant, &bundle).await;

    let upstream =
        crate::upstream::UpstreamClient::from_bundle(&bundle, state.config.upstream.connect_timeout)?;

    let mut path_and_query = format!("v{}/{}", version, rest);
    if let Some(query) = query {
        path_and_query.push('?');
        path_and_query.push_str(&query);
    }
    let url = upstream.url(&path_and_query);

    debug!(tenant = %tenant, method = %req.method(), path = %path_and_query, "Proxying upstream request");

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| GatewayError::internal(format!("unmappable method: {}", e)))?;

    let body = reqwest::Body::wrap_stream(req.into_body().into_data_stream());

    let upstream_response = upstream
        .http()
        .request(method, url)
        .body(body)
        .send()
        .await
        .map_err(|e| GatewayError::upstream_transport(format!("upstream request failed: {}", e)))?;

    let status = StatusCode::from_u16(upstream_response.status().as_u16())
        .map_err(|e| GatewayError::internal(format!("unmappable upstream status: {}", e)))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in upstream_response.headers() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        let name = match HeaderName::from_bytes(name.as_str().as_bytes()) {
            Ok(name) => name,
            Err(_) => continue,
        };
        let value = match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => value,
            Err(_) => continue,
        };
        builder = builder.header(name, value);
    }

    builder
        .body(Body::from_stream(upstream_response.bytes_stream()))
        .map_err(|e| GatewayError::internal(format!("response assembly failed: {}", e)))
}

/// Split `/{cluster}/{rest...}` into its cluster name and upstream path.
///
/// Both parts must be non-empty; anything else is a malformed path.
fn parse_proxy_path(path: &str) -> GatewayResult<(String, String)> {
    let trimmed = path.trim_start_matches('/');
    let mut parts = trimmed.splitn(2, '/');

    let cluster = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::path_malformed("no cluster segment in path"))?;
    let rest = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::path_malformed("no upstream path after cluster segment"))?;

    Ok((cluster.to_string(), rest.to_string()))
}
