use super::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

impl Cache {
    /// Read-through lookup: return the cached value for `key`, or run
    /// `load` against the database and store its result for `ttl`.
    ///
    /// A failing loader is never cached. Cache failures degrade to a plain
    /// database read.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl: Duration, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get_json::<T>(key).await {
            return Ok(hit);
        }

        let value = load().await?;
        self.set_json(key, &value, ttl).await;
        debug!("Cached result for {}", key);

        Ok(value)
    }

    /// Like [`Cache::remember`] for lookups that may find nothing. Misses
    /// are not cached, so a record created later is seen immediately.
    pub async fn remember_optional<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(hit) = self.get_json::<T>(key).await {
            return Ok(Some(hit));
        }

        let value = load().await?;
        if let Some(found) = &value {
            self.set_json(key, found, ttl).await;
        }

        Ok(value)
    }
}
