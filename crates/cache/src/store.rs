//! The key-value store contract and provider selection
//!
//! All read paths that can tolerate a miss treat a transient provider
//! failure as a miss (fail-open). Writes whose loss would change correctness
//! (idempotency tokens) must surface the error to the caller instead.

use crate::config::CacheConfig;
use crate::memory::MemoryStore;
use crate::redis::RedisStore;
use async_trait::async_trait;
use erd_studio_core::config::RedisConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The provider connection failed or the command errored
    #[error("Store connection error: {0}")]
    Connection(#[from] ::redis::RedisError),

    /// The command did not complete within the provider's response timeout
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Cumulative provider statistics since provider start
///
/// Observability only; never consulted for correctness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of `get` calls that returned a value
    pub hit_count: u64,
    /// Number of `get` calls that returned absent
    pub miss_count: u64,
    /// `hit_count / (hit_count + miss_count)`, 0.0 when no reads yet
    pub hit_ratio: f64,
    /// Entries currently held by the provider
    pub entry_count: u64,
}

impl StoreStats {
    /// Build stats from raw counters, computing the ratio
    pub fn from_counts(hit_count: u64, miss_count: u64, entry_count: u64) -> Self {
        let total = hit_count + miss_count;
        let hit_ratio = if total > 0 {
            hit_count as f64 / total as f64
        } else {
            0.0
        };

        Self {
            hit_count,
            miss_count,
            hit_ratio,
            entry_count,
        }
    }
}

/// Uniform store contract implemented by every provider
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any prior value.
    ///
    /// With a TTL the entry becomes logically absent once the TTL elapses.
    /// Visible immediately to subsequent `get` on the same provider instance
    /// (and, for the shared provider, to all instances within its
    /// consistency window).
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Fetch the value for `key`. Never returns a logically expired value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove `key`. Idempotent; evicting an absent key is not an error.
    async fn evict(&self, key: &str) -> Result<(), StoreError>;

    /// Whether a live (non-expired) entry exists for `key`
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Cumulative statistics since provider start
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Available store providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// In-process store; not shared across instances
    Memory,
    /// Network-shared Redis store
    Redis,
}

impl StoreProvider {
    /// All providers this build can construct
    pub const ALL: [StoreProvider; 2] = [StoreProvider::Memory, StoreProvider::Redis];

    /// Stable lowercase name, matching the configuration value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl std::str::FromStr for StoreProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!(
                "unknown store provider '{}', expected 'memory' or 'redis'",
                other
            )),
        }
    }
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List of providers an operator can select
pub fn available_providers() -> &'static [StoreProvider] {
    &StoreProvider::ALL
}

/// Construct the configured store provider.
///
/// # Errors
///
/// Returns an error when the Redis provider is selected and the connection
/// cannot be established.
pub async fn build_store(
    config: &CacheConfig,
    redis: &RedisConfig,
) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match config.provider {
        StoreProvider::Memory => Ok(Arc::new(MemoryStore::new(config.memory_max_entries))),
        StoreProvider::Redis => Ok(Arc::new(RedisStore::connect(redis).await?)),
    }
}
