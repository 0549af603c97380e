//! Redis cache implementation.
//!
//! `CacheStore` is the object-safe seam the services and middleware talk
//! to; `Cache` is the Redis-backed implementation with connection pooling.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError, Script};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::{Config, CACHE_PREFIX_RATE_LIMIT};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Keys per UNLINK call when clearing a pattern.
const DELETE_BATCH_SIZE: usize = 500;

/// Fixed-window counter. INCR and the expiry run as one script, and a
/// counter found without a TTL gets one, so a window always ends.
static RATE_LIMIT_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#,
    )
});

/// Key/value store with TTLs, pattern deletes and rate-limit counters.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the raw string stored under `key`.
    async fn get_raw(&self, key: &str) -> AppResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl_seconds`.
    async fn set_raw(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()>;

    /// Delete a value from cache.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Delete all keys matching a glob pattern, returning how many matched.
    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64>;

    /// Check and increment rate limit counter.
    /// Returns (current_count, is_allowed) tuple.
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)>;

    /// Round-trip to the backing store.
    async fn ping(&self) -> AppResult<()>;
}

impl dyn CacheStore {
    /// Get a JSON value from cache.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a JSON value in cache with a TTL (in seconds).
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;
        self.set_raw(key, json, ttl_seconds).await
    }
}

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    /// Connect to Redis.
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for Cache {
    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await.map_err(cache_error)?;
        Ok(())
    }

    /// Walks the keyspace with SCAN and unlinks matches in batches.
    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        let mut conn = self.connection.clone();

        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(cache_error)?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let mut count = 0;
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let removed: i64 = redis::cmd("UNLINK")
                .arg(batch)
                .query_async(&mut conn)
                .await
                .map_err(cache_error)?;
            count += removed.max(0) as u64;
        }

        Ok(count)
    }

    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: i64 = RATE_LIMIT_SCRIPT
            .key(&key)
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(cache_error)?;
        let count = count.max(0) as u64;

        Ok((count, count <= max_requests))
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }
}

/// Convert Redis error to AppError.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::internal(format!("Cache error: {}", e))
}

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryCache;

#[cfg(any(test, feature = "test-utils"))]
mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-process `CacheStore` for tests. TTLs are recorded, not enforced.
    #[derive(Default)]
    pub struct MemoryCache {
        entries: Mutex<HashMap<String, (String, u64)>>,
        counters: Mutex<HashMap<String, (u64, u64)>>,
    }

    impl MemoryCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }

        pub fn ttl(&self, key: &str) -> Option<u64> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }

        /// Window recorded for a rate-limit counter.
        pub fn counter_ttl(&self, identifier: &str) -> Option<u64> {
            self.counters
                .lock()
                .unwrap()
                .get(identifier)
                .map(|(_, window)| *window)
        }

        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }
    }

    /// Glob match supporting `*` only, which is all the key patterns use.
    pub(super) fn glob_match(pattern: &str, key: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 1 {
            return pattern == key;
        }

        let (first, last) = (parts[0], parts[parts.len() - 1]);
        if !key.starts_with(first) || !key[first.len()..].ends_with(last) {
            return false;
        }

        let mut rest = &key[first.len()..key.len() - last.len()];
        for part in &parts[1..parts.len() - 1] {
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
        true
    }

    #[async_trait]
    impl CacheStore for MemoryCache {
        async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
            Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
        }

        async fn set_raw(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value, ttl_seconds));
            Ok(())
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|key, _| !glob_match(pattern, key));
            Ok((before - entries.len()) as u64)
        }

        async fn check_rate_limit(
            &self,
            identifier: &str,
            max_requests: u64,
            window_seconds: u64,
        ) -> AppResult<(u64, bool)> {
            let mut counters = self.counters.lock().unwrap();
            let (count, window) = counters
                .entry(identifier.to_string())
                .or_insert((0, window_seconds));
            *count += 1;
            *window = window_seconds;
            Ok((*count, *count <= max_requests))
        }

        async fn ping(&self) -> AppResult<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::memory::glob_match;
    use super::*;

    #[test]
    fn test_glob_match() {
        let owner = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
        let pattern = format!("contacts:*:{}:*", owner);

        assert!(glob_match(&pattern, &format!("contacts:search:{}:abc", owner)));
        assert!(glob_match(&pattern, &format!("contacts:birthdays:{}:7", owner)));
        assert!(!glob_match(&pattern, "contacts:search:someone-else:abc"));
        assert!(!glob_match(&pattern, &format!("rt:{}", owner)));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[tokio::test]
    async fn test_json_helpers_round_trip_through_store() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());

        store.set_json("k", &vec![1, 2, 3], 60).await.unwrap();
        let value: Option<Vec<i32>> = store.get_json("k").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        let missing: Option<Vec<i32>> = store.get_json("nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        store.set_raw("k", "{not json".into(), 60).await.unwrap();

        let result: AppResult<Option<Vec<i32>>> = store.get_json("k").await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_memory_rate_limit_counts() {
        let cache = MemoryCache::new();
        assert_eq!(cache.check_rate_limit("ip", 2, 60).await.unwrap(), (1, true));
        assert_eq!(cache.check_rate_limit("ip", 2, 60).await.unwrap(), (2, true));
        assert_eq!(cache.check_rate_limit("ip", 2, 60).await.unwrap(), (3, false));
        assert_eq!(cache.counter_ttl("ip"), Some(60));
    }

    async fn redis_cache() -> Cache {
        let mut config = Config::for_tests("test-secret-key-for-testing-only-32chars");
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis_url = url;
        }
        Cache::connect(&config).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a running Redis at REDIS_URL"]
    async fn test_redis_rate_limit_counter_always_expires() {
        let cache = redis_cache().await;
        let identifier = format!("test:{}", uuid::Uuid::new_v4());
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = cache.connection.clone();

        assert_eq!(cache.check_rate_limit(&identifier, 2, 60).await.unwrap(), (1, true));
        assert_eq!(cache.check_rate_limit(&identifier, 2, 60).await.unwrap(), (2, true));
        assert_eq!(cache.check_rate_limit(&identifier, 2, 60).await.unwrap(), (3, false));
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 60, "ttl = {}", ttl);

        // A counter that lost its expiry gets a fresh one on the next hit
        let _: () = conn.persist(&key).await.unwrap();
        assert_eq!(cache.check_rate_limit(&identifier, 2, 60).await.unwrap(), (4, false));
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 60, "ttl = {}", ttl);

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a running Redis at REDIS_URL"]
    async fn test_redis_delete_pattern_spans_scan_batches() {
        let cache = redis_cache().await;
        let owner = uuid::Uuid::new_v4();

        for i in 0..(DELETE_BATCH_SIZE + 20) {
            cache
                .set_raw(&format!("contacts:search:{}:{}", owner, i), "[]".into(), 60)
                .await
                .unwrap();
        }
        cache
            .set_raw(&format!("rt:{}", owner), "keep".into(), 60)
            .await
            .unwrap();

        let removed = cache
            .delete_pattern(&format!("contacts:*:{}:*", owner))
            .await
            .unwrap();

        assert_eq!(removed, (DELETE_BATCH_SIZE + 20) as u64);
        assert!(cache.get_raw(&format!("rt:{}", owner)).await.unwrap().is_some());
        cache.delete(&format!("rt:{}", owner)).await.unwrap();
    }
}
