// Cache-aside layer with an in-memory fallback when Redis is not configured

use crate::config::CacheConfig;
use dashmap::DashMap;
use metrics::counter;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub mod query;
pub mod strategy;

pub use strategy::{matches_pattern, CacheNamespace};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    /// Removes every key matching a glob pattern such as `kitchen-stock:*`.
    /// Returns how many keys were dropped.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() > expires_at)
            .unwrap_or(false)
    }
}

/// Process-local backend used in tests and when no Redis URL is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.store.iter().filter(|e| !e.value().is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently held, expired ones included until they are touched.
    pub fn keys(&self) -> Vec<String> {
        self.store.iter().map(|e| e.key().clone()).collect()
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.store.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.store
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .store
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false))
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut removed = 0;
        self.store.retain(|key, _| {
            if matches_pattern(pattern, key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        debug!("Invalidated {} entries matching pattern: {}", removed, pattern);
        Ok(removed)
    }
}

#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let result: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        match ttl {
            Some(ttl) => {
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(ttl.as_secs().max(1))
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
            None => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async::<_, ()>(&mut conn)
                    .await?
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.client.get_async_connection().await?;
        let found: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(found)
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut conn = self.client.get_async_connection().await?;

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await?;

        if !keys.is_empty() {
            redis::cmd("DEL")
                .arg(&keys)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }

        debug!("Invalidated {} redis keys matching pattern: {}", keys.len(), pattern);
        Ok(keys.len())
    }
}

pub struct CacheFactory;

impl CacheFactory {
    /// Picks the backend named in configuration. A Redis URL that cannot be
    /// parsed falls back to the in-memory store with a warning.
    pub fn create_backend(config: &CacheConfig) -> Arc<dyn CacheBackend> {
        if config.backend == "redis" {
            if let Some(redis_url) = &config.redis_url {
                match RedisCache::new(redis_url) {
                    Ok(redis_cache) => return Arc::new(redis_cache),
                    Err(e) => {
                        warn!("Failed to open Redis client, falling back to in-memory cache: {}", e);
                    }
                }
            }
        }

        Arc::new(InMemoryCache::new())
    }
}

/// Typed facade over a [`CacheBackend`]. Every failure is logged and
/// swallowed: the database stays the source of truth.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    enabled: bool,
    default_ttl: Duration,
    list_ttl: Duration,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            enabled: config.enabled,
            default_ttl: config.default_ttl(),
            list_ttl: config.list_ttl(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(CacheFactory::create_backend(config), config)
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCache::new()), &CacheConfig::default())
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// TTL for single-record entries.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// TTL for paginated listings.
    pub fn list_ttl(&self) -> Duration {
        self.list_ttl
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!("kitchen_ops.cache.hit", 1);
                    debug!("Cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    let _ = self.backend.delete(key).await;
                    None
                }
            },
            Ok(None) => {
                counter!("kitchen_ops.cache.miss", 1);
                debug!("Cache miss: {}", key);
                None
            }
            Err(e) => {
                counter!("kitchen_ops.cache.error", 1);
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if !self.enabled {
            return;
        }

        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize value for cache key {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.backend.set(key, &serialized, Some(ttl)).await {
            counter!("kitchen_ops.cache.error", 1);
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            warn!("Cache delete failed for {}: {}", key, e);
        }
    }

    /// Drops every key in the namespace. Call only after the governing
    /// write has committed.
    pub async fn invalidate(&self, namespace: CacheNamespace) {
        self.invalidate_pattern(&namespace.pattern()).await;
    }

    pub async fn invalidate_many(&self, namespaces: &[CacheNamespace]) {
        for namespace in namespaces {
            self.invalidate(*namespace).await;
        }
    }

    pub async fn invalidate_pattern(&self, pattern: &str) {
        match self.backend.invalidate_pattern(pattern).await {
            Ok(removed) => {
                counter!("kitchen_ops.cache.invalidated", removed as u64);
            }
            Err(e) => {
                counter!("kitchen_ops.cache.error", 1);
                warn!("Cache invalidation failed for pattern {}: {}", pattern, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    #[async_trait::async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
        async fn invalidate_pattern(&self, _pattern: &str) -> Result<usize, CacheError> {
            Err(CacheError::OperationFailed("down".into()))
        }
    }

    #[tokio::test]
    async fn expired_entries_read_as_missing() {
        let cache = InMemoryCache::new();
        cache
            .set("kitchen-items:id:1", "v", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("kitchen-items:id:1").await.unwrap(), None);
        assert!(!cache.exists("kitchen-items:id:1").await.unwrap());
    }

    #[tokio::test]
    async fn pattern_invalidation_only_touches_its_namespace() {
        let cache = InMemoryCache::new();
        cache.set("kitchen-stock:id:1", "a", None).await.unwrap();
        cache.set("kitchen-stock:list:page=1", "b", None).await.unwrap();
        cache.set("kitchen-orders:id:1", "c", None).await.unwrap();

        let removed = cache.invalidate_pattern("kitchen-stock:*").await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["kitchen-orders:id:1".to_string()]);
    }

    #[tokio::test]
    async fn facade_swallows_backend_failures() {
        let cache = Cache::new(Arc::new(FailingBackend), &CacheConfig::default());

        cache.set_json("categories:id:1", &42u32, Duration::from_secs(5)).await;
        let value: Option<u32> = cache.get_json("categories:id:1").await;
        cache.invalidate(CacheNamespace::Categories).await;

        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn disabled_cache_never_stores() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let backend = Arc::new(InMemoryCache::new());
        let cache = Cache::new(backend.clone(), &config);

        cache.set_json("discounts:id:1", &"x", Duration::from_secs(5)).await;

        assert!(backend.is_empty());
    }
}
