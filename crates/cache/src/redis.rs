//! Network-shared store provider backed by Redis
//!
//! Values written here are visible to every service instance and survive
//! instance restarts. Every command runs under the configured response
//! timeout so a degraded Redis can never stall a caller indefinitely;
//! callers on read paths treat the resulting errors as misses.

use crate::store::{KeyValueStore, StoreError, StoreStats};
use async_trait::async_trait;
use erd_studio_core::config::RedisConfig;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};

/// Network-shared key-value store
///
/// Hit/miss counters are tracked locally so statistics have the same
/// meaning under either provider: cumulative for this provider instance
/// since start, not server-wide Redis keyspace numbers.
pub struct RedisStore {
    manager: ConnectionManager,
    response_timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with a PING
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established within the
    /// configured connection timeout.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        info!(url = %config.url, "Connecting Redis store provider");

        let client = Client::open(config.url.as_str())?;
        let manager = timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(config.connection_timeout))??;

        let store = Self {
            manager,
            response_timeout: config.response_timeout,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };

        let mut conn = store.manager.clone();
        store
            .run(::redis::cmd("PING").query_async::<_, String>(&mut conn))
            .await?;

        info!("Redis store provider ready");
        Ok(store)
    }

    /// Run a Redis future under the response timeout
    async fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = ::redis::RedisResult<T>>,
    {
        match timeout(self.response_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.response_timeout)),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();

        match ttl {
            Some(ttl) => {
                // SETEX has whole-second granularity; round sub-second TTLs up
                let secs = ttl.as_secs().max(1);
                self.run(conn.set_ex::<_, _, ()>(key, value, secs)).await?;
            }
            None => {
                self.run(conn.set::<_, _, ()>(key, value)).await?;
            }
        }

        debug!(key = %key, "Store put");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = self.run(conn.get(key)).await?;

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Store hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Store miss");
        }

        Ok(value)
    }

    async fn evict(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _deleted: u64 = self.run(conn.del(key)).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let exists: bool = self.run(conn.exists(key)).await?;
        Ok(exists)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut conn = self.manager.clone();
        let entry_count: u64 = self
            .run(::redis::cmd("DBSIZE").query_async(&mut conn))
            .await?;

        Ok(StoreStats::from_counts(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            entry_count,
        ))
    }
}
