//! # Error Handling Module
//!
//! This module provides error handling for the gateway using the `thiserror`
//! crate. It defines all failure categories that can occur while resolving
//! credentials, negotiating upstream versions, and proxying traffic, and maps
//! each category to the HTTP status code clients should see.
//!
//! Every abort path in the gateway funnels through `IntoResponse` here, which
//! writes exactly one JSON `{"error": ...}` body. Handlers return
//! `GatewayResult<Response>`, so a request can never be answered twice: either
//! the success response is produced, or the single error conversion runs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure categories for the gateway.
///
/// The enum is `Clone` because credential resolution fans a single in-flight
/// result out to every coalesced waiter.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// The session token is missing or the session service rejected it.
    #[error("Session invalid: {reason}")]
    SessionInvalid { reason: String },

    /// The request path is missing the cluster or upstream path segment.
    #[error("Path malformed: {message}")]
    PathMalformed { message: String },

    /// The credential archive could not be obtained or downloaded.
    #[error("Credential fetch failed: {message}")]
    CredentialFetch { message: String },

    /// The credential archive unpacked without producing a full bundle.
    #[error("Credential bundle incomplete: missing {missing}")]
    CredentialBundleIncomplete { missing: String },

    /// TLS/connect/transport failure talking to the tenant's cluster API.
    #[error("Upstream transport error: {message}")]
    UpstreamTransport { message: String },

    /// Cache store failures (Redis connectivity, serialization).
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Configuration loading or validation errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {message}")]
    Json { message: String },

    /// I/O errors (listener binding, archive streaming).
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Unexpected internal failures.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn session_invalid<S: Into<String>>(reason: S) -> Self {
        Self::SessionInvalid {
            reason: reason.into(),
        }
    }

    pub fn path_malformed<S: Into<String>>(message: S) -> Self {
        Self::PathMalformed {
            message: message.into(),
        }
    }

    pub fn credential_fetch<S: Into<String>>(message: S) -> Self {
        Self::CredentialFetch {
            message: message.into(),
        }
    }

    pub fn upstream_transport<S: Into<String>>(message: S) -> Self {
        Self::UpstreamTransport {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map this error to the HTTP status code the client should receive.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SessionInvalid { .. } => StatusCode::UNAUTHORIZED,
            Self::PathMalformed { .. } => StatusCode::NOT_FOUND,
            Self::CredentialFetch { .. } => StatusCode::BAD_GATEWAY,
            Self::CredentialBundleIncomplete { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamTransport { .. } => StatusCode::BAD_GATEWAY,
            Self::Cache { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Json { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

/// Convert errors into the single JSON error body clients see on abort.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
