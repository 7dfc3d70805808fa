//! Idempotency tokens over the key-value store
//!
//! A token may be claimed once within its TTL; a second claim observes the
//! stored marker and is rejected. Losing the marker write would change
//! correctness (a retried request would broadcast twice), so unlike read
//! paths the write here surfaces store failures to the caller.
//!
//! The exists/put pair is not atomic across instances. A racing duplicate
//! can slip through the window; consumers of the resulting events are
//! idempotent, so the window is accepted rather than widening the store
//! contract with a provider-specific compare-and-set.

use crate::store::{KeyValueStore, StoreError};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "idempotency";

/// Claims short-lived idempotency tokens
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl IdempotencyGuard {
    /// Create a guard whose claims expire after `ttl`
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Key for a token: hashed so arbitrary client-chosen tokens cannot
    /// collide with other key namespaces
    fn key_for(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{}:{}", KEY_PREFIX, hex::encode(hasher.finalize()))
    }

    /// Claim `token`. Returns `true` if this caller won the claim, `false`
    /// if the token was already claimed within its TTL.
    ///
    /// # Errors
    ///
    /// Store failures are surfaced, not swallowed: a lost claim write means
    /// duplicate suppression can no longer be promised.
    pub async fn claim(&self, token: &str) -> Result<bool, StoreError> {
        let key = Self::key_for(token);

        if self.store.exists(&key).await? {
            debug!(token = %token, "Idempotency token already claimed");
            return Ok(false);
        }

        self.store.put(&key, "1", Some(self.ttl)).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn guard() -> IdempotencyGuard {
        IdempotencyGuard::new(Arc::new(MemoryStore::new(64)), Duration::from_secs(60))
    }

    #[test]
    fn test_key_is_hashed_and_prefixed() {
        let key = IdempotencyGuard::key_for("req-1");
        assert!(key.starts_with("idempotency:"));
        assert_eq!(key.len(), "idempotency:".len() + 64);
        assert_ne!(key, IdempotencyGuard::key_for("req-2"));
    }

    #[tokio::test]
    async fn test_first_claim_wins() {
        let guard = guard();

        assert!(guard.claim("req-1").await.unwrap());
        assert!(!guard.claim("req-1").await.unwrap());

        // a different token is unaffected
        assert!(guard.claim("req-2").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_reopens_after_ttl() {
        let guard = IdempotencyGuard::new(
            Arc::new(MemoryStore::new(64)),
            Duration::from_secs(30),
        );

        assert!(guard.claim("req-1").await.unwrap());
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(guard.claim("req-1").await.unwrap());
    }
}
