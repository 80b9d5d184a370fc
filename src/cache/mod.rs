// src/cache/mod.rs
// Read-through cache over a key/value store.
//
// The cache is an optimization, never a system of record: every failure of
// the backing store is logged, counted and then treated as a miss (reads) or
// a no-op (writes and deletes).

pub mod discount;
pub mod invalidation;
pub mod keys;
pub mod memory;
pub mod redis_cache;

pub use discount::DiscountStore;
pub use invalidation::{InvalidationEngine, InvalidationPlan};
pub use keys::CacheKey;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::monitoring::metrics::{CACHE_ERRORS_TOTAL, CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("cache serialization error: {0}")]
    Serialization(String),
    #[error("cache store unavailable")]
    Unavailable,
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Raw string key/value store. Values are JSON documents.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;
    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
    fn name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Stored value, or `None` when absent or unreadable.
    ///
    /// A stored empty list or object comes back as `Some`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                CACHE_MISSES_TOTAL.inc();
                debug!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                CACHE_ERRORS_TOTAL.with_label_values(&["get"]).inc();
                CACHE_MISSES_TOTAL.inc();
                warn!(key, backend = self.backend.name(), error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                CACHE_HITS_TOTAL.inc();
                debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                CACHE_MISSES_TOTAL.inc();
                warn!(key, error = %e, "Cached value does not match expected shape, treating as miss");
                None
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.get_json(key).await
    }

    /// Serialize and store, overwriting unconditionally.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                CACHE_ERRORS_TOTAL.with_label_values(&["set"]).inc();
                warn!(key, error = %e, "Failed to serialize cache value");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, json).await {
            CACHE_ERRORS_TOTAL.with_label_values(&["set"]).inc();
            warn!(key, backend = self.backend.name(), error = %e, "Cache write failed");
        }
    }

    /// Idempotent. Returns whether the store acknowledged the delete.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                CACHE_ERRORS_TOTAL.with_label_values(&["delete"]).inc();
                warn!(key, backend = self.backend.name(), error = %e, "Cache delete failed");
                false
            }
        }
    }

    /// Drop every key in the store.
    pub async fn delete_all(&self) -> bool {
        match self.backend.clear().await {
            Ok(()) => true,
            Err(e) => {
                CACHE_ERRORS_TOTAL.with_label_values(&["clear"]).inc();
                warn!(backend = self.backend.name(), error = %e, "Cache flush failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> (Arc<MemoryCache>, ReadThroughCache) {
        let backend = Arc::new(MemoryCache::new());
        (backend.clone(), ReadThroughCache::new(backend))
    }

    #[tokio::test]
    async fn test_set_get() {
        let (_, cache) = cache();
        cache.set("k", &vec!["a".to_string(), "b".to_string()]).await;

        let value: Vec<String> = cache.get_json("k").await.unwrap();
        assert_eq!(value, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_list_is_not_absent() {
        let (_, cache) = cache();
        cache.set("empty", &Vec::<String>::new()).await;

        assert_eq!(cache.get("empty").await, Some(json!([])));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (backend, cache) = cache();
        cache.set("k", &1).await;

        assert!(cache.delete("k").await);
        let after_first = backend.keys();
        assert!(cache.delete("k").await);
        assert_eq!(backend.keys(), after_first);
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (backend, cache) = cache();
        cache.set("a", &1).await;
        cache.set("b", &2).await;

        assert!(cache.delete_all().await);
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_miss() {
        let (backend, cache) = cache();
        cache.set("k", &1).await;
        backend.set_unavailable(true);

        assert_eq!(cache.get("k").await, None);
        cache.set("other", &2).await;
        assert!(!cache.delete("k").await);
        assert!(!cache.delete_all().await);

        backend.set_unavailable(false);
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn test_mismatched_shape_is_a_miss() {
        let (_, cache) = cache();
        cache.set("k", &json!({"a": 1})).await;

        let value: Option<Vec<String>> = cache.get_json("k").await;
        assert!(value.is_none());
    }
}
