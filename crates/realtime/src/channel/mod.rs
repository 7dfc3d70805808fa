//! Scope-partitioned broadcast channel
//!
//! Channel structure: one name per collaboration scope, `erd.scope.{projectId}`.
//! The Redis transport holds a single pattern subscription on the shared
//! prefix and dispatches locally by exact scope id, so one connection
//! multiplexes arbitrarily many scopes. Delivery is best-effort: no
//! transport-level deduplication (consumers are idempotent) and no ordering
//! guarantee across scopes.

mod local;
mod redis;

pub use self::local::LocalBroadcast;
pub use self::redis::RedisBroadcast;

use async_trait::async_trait;
use erd_studio_cache::StoreProvider;
use erd_studio_core::config::RedisConfig;
use std::sync::Arc;
use thiserror::Error;

/// Shared channel-name prefix for scope partitions
pub const CHANNEL_PREFIX: &str = "erd.scope.";

/// Pattern covering every scope partition
pub const CHANNEL_PATTERN: &str = "erd.scope.*";

/// Channel name for a scope
pub fn channel_for(scope_id: &str) -> String {
    format!("{}{}", CHANNEL_PREFIX, scope_id)
}

/// Extract the scope id from a channel name, if it carries our prefix
pub fn scope_from_channel(channel: &str) -> Option<&str> {
    channel.strip_prefix(CHANNEL_PREFIX).filter(|s| !s.is_empty())
}

/// Transport errors. Always non-fatal to the caller: the mutation that
/// triggered a publish has already committed.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Transport connection error: {0}")]
    Connection(String),

    #[error("Publish to scope {scope_id} failed: {reason}")]
    Publish { scope_id: String, reason: String },
}

/// Callback invoked on this instance for every message published to a
/// subscribed scope, by any instance including this one
#[async_trait]
pub trait ScopeHandler: Send + Sync {
    async fn on_message(&self, scope_id: &str, payload: &str);
}

/// Cross-instance broadcast transport
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Publish `payload` to a scope. Failure is non-fatal to the caller.
    async fn publish(&self, scope_id: &str, payload: &str) -> Result<(), ChannelError>;

    /// Register the handler invoked for the scope's messages on this
    /// instance. Re-subscribing a scope replaces its handler (idempotent).
    async fn subscribe(
        &self,
        scope_id: &str,
        handler: Arc<dyn ScopeHandler>,
    ) -> Result<(), ChannelError>;

    /// Stop dispatching the scope's messages on this instance. Safe to call
    /// for a scope that was never subscribed.
    async fn unsubscribe(&self, scope_id: &str);
}

/// Construct the transport matching the selected store provider: the
/// in-process loopback for `memory`, Redis pub/sub for `redis`.
pub async fn build_transport(
    provider: StoreProvider,
    redis: &RedisConfig,
) -> Result<Arc<dyn BroadcastTransport>, ChannelError> {
    match provider {
        StoreProvider::Memory => Ok(Arc::new(LocalBroadcast::new())),
        StoreProvider::Redis => Ok(Arc::new(RedisBroadcast::connect(redis).await?)),
    }
}
