//! # Caching System Module
//!
//! TTL key/value caching for resolved credential bundles and negotiated API
//! versions. The gateway only defines key formatting (`core::types::TenantKey`)
//! and JSON serialization; storage goes through the [`CacheStore`] trait with
//! a Redis backend for deployment and an in-memory backend for tests and
//! single-node development.
//!
//! A miss is modeled as `Ok(None)` and is never conflated with a stored null:
//! stores only ever hold serialized JSON written by [`set_json`].

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryCache;
pub use redis_store::RedisCache;

use crate::core::error::GatewayError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Cache operation result.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        GatewayError::Cache {
            message: err.to_string(),
        }
    }
}

/// Trait for TTL'd key/value cache backends.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value with a time-to-live.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete a value. Returns whether the key existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;
}

/// Fetch and deserialize a cached JSON value.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> CacheResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and store a JSON value with a TTL.
pub async fn set_json<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> CacheResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw, ttl).await
}
