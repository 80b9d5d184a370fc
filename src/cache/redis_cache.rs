// src/cache/redis_cache.rs - Redis cache backend

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{error, info};

use super::{CacheBackend, CacheError};

/// Redis-backed cache store.
///
/// Entries carry no expiry; they live until invalidated or flushed. When the
/// connection cannot be established the cache runs disabled and every read
/// is a miss.
#[derive(Clone)]
pub struct RedisCache {
    client: Option<ConnectionManager>,
}

impl RedisCache {
    /// Open a managed connection to `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        info!(url = %redact(redis_url), "Redis cache connected");
        Ok(Self {
            client: Some(manager),
        })
    }

    /// Connect, or fall back to a disabled cache when Redis is unreachable.
    pub async fn connect_or_disabled(redis_url: &str) -> Self {
        match Self::connect(redis_url).await {
            Ok(cache) => cache,
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis, running without cache");
                Self::disabled()
            }
        }
    }

    /// Create disabled Redis cache (fallback)
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn health_check(&self) -> Result<String, CacheError> {
        match &self.client {
            Some(client) => {
                let mut conn = client.clone();
                let pong: String = redis::cmd("PING").query_async::<String>(&mut conn).await?;
                Ok(pong)
            }
            None => Ok("Redis disabled".to_string()),
        }
    }

    /// Release the connection. Clones held elsewhere keep theirs until dropped.
    pub async fn close(mut self) {
        if self.client.take().is_some() {
            info!("Redis cache connection closed");
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let Some(client) = &self.client else {
            return Ok(None);
        };
        let mut conn = client.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let mut conn = client.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let mut conn = client.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let mut conn = client.clone();
        redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
