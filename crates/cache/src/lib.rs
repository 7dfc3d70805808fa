//! # ERD Studio Cache
//!
//! Provider-selectable key-value store used across the platform as both a
//! short-lived value cache (idempotency tokens, ephemeral session entries)
//! and, through the Redis provider's pub/sub capability, the backing for the
//! cross-instance broadcast transport.
//!
//! Two providers implement one contract:
//!
//! - [`MemoryStore`]: in-process, fast, not shared across instances, lost on
//!   restart
//! - [`RedisStore`]: network-shared, survives instance restarts, subject to
//!   network failure (every command runs under a short timeout)
//!
//! Provider selection is a configuration-time decision; switching providers
//! changes consistency/availability tradeoffs but never the contract.

pub mod config;
pub mod memory;
pub mod redis;
pub mod store;
pub mod token;

pub use config::CacheConfig;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
pub use store::{
    available_providers, build_store, KeyValueStore, StoreError, StoreProvider, StoreStats,
};
pub use token::IdempotencyGuard;
