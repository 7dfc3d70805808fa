//! Upgrade-token resolution backed by the key-value store
//!
//! The auth service writes an ephemeral `session:{sha256(token)}` entry when
//! it issues a token; this resolver reads it back at connection-upgrade
//! time. Auth lookups are fail-closed: a store failure denies the upgrade
//! rather than admitting an unverifiable client.

use async_trait::async_trait;
use erd_studio_cache::KeyValueStore;
use erd_studio_core::auth::{AuthContext, SessionResolver};
use erd_studio_core::error::ErdStudioError;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

const SESSION_KEY_PREFIX: &str = "session";

fn session_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{}:{}", SESSION_KEY_PREFIX, hex::encode(hasher.finalize()))
}

/// Write a session entry for a token. Called by the token issuer; exposed
/// here so tests and tooling can mint sessions against the same key scheme.
pub async fn store_session(
    store: &Arc<dyn KeyValueStore>,
    token: &str,
    ctx: &AuthContext,
    ttl: Duration,
) -> Result<(), ErdStudioError> {
    let value =
        serde_json::to_string(ctx).map_err(|e| ErdStudioError::Internal(e.to_string()))?;

    store
        .put(&session_key(token), &value, Some(ttl))
        .await
        .map_err(|e| ErdStudioError::StoreError(e.to_string()))
}

/// Session resolver over the shared key-value store
pub struct StoreSessionResolver {
    store: Arc<dyn KeyValueStore>,
}

impl StoreSessionResolver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionResolver for StoreSessionResolver {
    async fn resolve(&self, token: &str) -> Result<AuthContext, ErdStudioError> {
        let value = self
            .store
            .get(&session_key(token))
            .await
            .map_err(|e| ErdStudioError::StoreError(e.to_string()))?;

        let raw = value
            .ok_or_else(|| ErdStudioError::Unauthorized("unknown or expired token".to_string()))?;

        serde_json::from_str(&raw)
            .map_err(|e| ErdStudioError::Internal(format!("corrupt session entry: {}", e)))
    }
}
