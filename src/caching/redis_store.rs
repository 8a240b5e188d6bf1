//! Redis cache store.
//!
//! Uses a `ConnectionManager` for automatic reconnection and `SET key value
//! EX ttl` so the store owns expiry. Keys are namespaced with a configurable
//! prefix so the gateway can share a Redis instance with the control panel.

use super::{CacheResult, CacheStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

/// Redis-backed TTL cache.
pub struct RedisCache {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to Redis and return a ready store.
    pub async fn connect(url: &str, key_prefix: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        info!(url, "Redis cache connected");

        Ok(Self {
            manager,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.full_key(key)).await?;
        match &value {
            Some(_) => debug!(key, "redis cache hit"),
            None => debug!(key, "redis cache miss"),
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(self.full_key(key), value, ttl.as_secs())
            .await?;
        debug!(key, ttl_secs = ttl.as_secs(), "redis cache set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.manager.clone();
        let removed: i32 = conn.del(self.full_key(key)).await?;
        Ok(removed > 0)
    }
}
