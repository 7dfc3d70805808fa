//! In-process store provider
//!
//! Fast and instance-local: values are not visible to other service
//! instances and do not survive a restart. Expiry is enforced lazily on
//! read, so a logically expired entry is never observable even if it is
//! still physically present. Under capacity pressure the provider first
//! sweeps expired entries and then drops an arbitrary live entry.

use crate::store::{KeyValueStore, StoreError, StoreStats};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// In-process key-value store
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    /// Create a store bounded to `max_entries` live entries
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Sweep expired entries, then drop an arbitrary entry if still at
    /// capacity. Dropping early is allowed; resurrecting is not, and cannot
    /// happen here because dropped entries are gone from the map.
    fn make_room(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        if self.entries.len() >= self.max_entries {
            let victim = self.entries.iter().next().map(|e| e.key().clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }

        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry);

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let value = self.entries.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match value {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                // lazily drop the expired entry, if that is what we hit
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn evict(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false);

        if !live {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        Ok(live)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        Ok(StoreStats::from_counts(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.entries.len() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new(16);

        store.put("k1", "v1", None).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some("v1".to_string()));

        // replacing
        store.put("k1", "v2", None).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new(16);

        store
            .put("k1", "v1", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some("v1".to_string()));
        assert!(store.exists("k1").await.unwrap());

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(store.get("k1").await.unwrap(), None);
        assert!(!store.exists("k1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_never_resurrected_by_stats() {
        let store = MemoryStore::new(16);

        store
            .put("k1", "v1", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evict_is_idempotent() {
        let store = MemoryStore::new(16);

        store.put("k1", "v1", None).await.unwrap();
        store.evict("k1").await.unwrap();
        assert!(!store.exists("k1").await.unwrap());

        // evicting an absent key is not an error
        store.evict("k1").await.unwrap();
        store.evict("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_capacity_pressure_drops_an_entry() {
        let store = MemoryStore::new(2);

        store.put("k1", "v1", None).await.unwrap();
        store.put("k2", "v2", None).await.unwrap();
        store.put("k3", "v3", None).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert!(stats.entry_count <= 2);
        // the newest entry is always present
        assert_eq!(store.get("k3").await.unwrap(), Some("v3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_pressure_prefers_expired_entries() {
        let store = MemoryStore::new(2);

        store
            .put("k1", "v1", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        store.put("k2", "v2", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;

        store.put("k3", "v3", None).await.unwrap();

        // the expired k1 was swept; the live k2 survived
        assert_eq!(store.get("k2").await.unwrap(), Some("v2".to_string()));
        assert_eq!(store.get("k3").await.unwrap(), Some("v3".to_string()));
    }

    #[tokio::test]
    async fn test_instances_do_not_share_entries() {
        // the in-process provider is deliberately instance-local; a second
        // store stands in for a second service instance
        let store_a = MemoryStore::new(16);
        let store_b = MemoryStore::new(16);

        store_a.put("k1", "v1", None).await.unwrap();

        assert_eq!(store_a.get("k1").await.unwrap(), Some("v1".to_string()));
        assert_eq!(store_b.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let store = MemoryStore::new(16);

        store.put("k1", "v1", None).await.unwrap();
        store.get("k1").await.unwrap();
        store.get("k1").await.unwrap();
        store.get("absent").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
        assert!((stats.hit_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.entry_count, 1);
    }
}
