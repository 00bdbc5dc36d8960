//! services/api/src/adapters/cache.rs
//!
//! Implementations of the `CacheStore` port: Redis behind a `bb8` pool for
//! deployments, and an in-process map for single-node runs and tests. Both
//! give `get_updating` the same sliding-expiration behaviour.

use async_trait::async_trait;
use bank_core::ports::{CacheError, CacheStore};
use bb8_redis::{bb8, redis, redis::AsyncCommands, RedisConnectionManager};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

//=========================================================================================
// Redis
//=========================================================================================

#[derive(Clone)]
pub struct RedisCache {
    pool: bb8::Pool<RedisConnectionManager>,
}

impl RedisCache {
    /// Builds the connection pool and checks out one connection so a bad URL
    /// fails at startup rather than on the first login.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(url).map_err(redis_error)?;
        let pool = bb8::Pool::builder()
            .build(manager)
            .await
            .map_err(redis_error)?;
        drop(pool.get().await.map_err(pool_error)?);
        Ok(Self { pool })
    }
}

fn redis_error(e: redis::RedisError) -> CacheError {
    CacheError::Unexpected(e.to_string())
}

fn pool_error(e: bb8::RunError<redis::RedisError>) -> CacheError {
    CacheError::Unexpected(e.to_string())
}

/// Redis rejects a zero expiry, so sub-second TTLs round up.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn = &mut *pooled;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .map_err(redis_error)
    }

    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn = &mut *pooled;
        let value: Option<String> = conn.get(key).await.map_err(redis_error)?;
        value.ok_or(CacheError::Missing)
    }

    async fn get_updating(&self, key: &str, ttl: Duration) -> Result<String, CacheError> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn = &mut *pooled;
        let (value, _refreshed): (Option<String>, bool) = redis::pipe()
            .atomic()
            .get(key)
            .expire(key, ttl_secs(ttl) as i64)
            .query_async(conn)
            .await
            .map_err(redis_error)?;
        value.ok_or(CacheError::Missing)
    }
}

//=========================================================================================
// In-process
//=========================================================================================

struct Entry {
    value: String,
    expires_at: Instant,
}

/// A process-local cache.
///
/// Expired entries are dropped when their key is read and swept on every
/// `set`, so tokens that are never presented again do not pile up.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: now + ttl,
        };
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                Err(CacheError::Missing)
            }
            None => Err(CacheError::Missing),
        }
    }

    async fn get_updating(&self, key: &str, ttl: Duration) -> Result<String, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + ttl;
                Ok(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                Err(CacheError::Missing)
            }
            None => Err(CacheError::Missing),
        }
    }
}
