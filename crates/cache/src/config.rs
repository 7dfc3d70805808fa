//! Cache configuration
//!
//! Provider selection is made here, at configuration time; it is not
//! switchable mid-request.

use crate::store::StoreProvider;
use erd_studio_core::config::{parse_env_var, ConfigLoader};
use erd_studio_core::error::ErdStudioError;
use std::time::Duration;

/// Cache configuration
///
/// # Environment Variables
///
/// - `ERD_STUDIO_CACHE_PROVIDER` (optional): `memory` or `redis` (default: "memory")
/// - `ERD_STUDIO_CACHE_DEFAULT_TTL` (optional): Default entry TTL in seconds (default: 300)
/// - `ERD_STUDIO_CACHE_MAX_ENTRIES` (optional): Capacity bound for the memory provider (default: 10000)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Selected store provider
    pub provider: StoreProvider,
    /// Default TTL applied to short-lived entries
    pub default_ttl: Duration,
    /// Entry capacity of the in-process provider; entries may be dropped
    /// early under this pressure
    pub memory_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Memory,
            default_ttl: Duration::from_secs(300),
            memory_max_entries: 10_000,
        }
    }
}

impl ConfigLoader for CacheConfig {
    fn from_env() -> Result<Self, ErdStudioError> {
        let provider = match std::env::var("ERD_STUDIO_CACHE_PROVIDER") {
            Ok(raw) => raw
                .parse::<StoreProvider>()
                .map_err(|message| ErdStudioError::ConfigurationError {
                    message,
                    key: Some("ERD_STUDIO_CACHE_PROVIDER".to_string()),
                })?,
            Err(_) => CacheConfig::default().provider,
        };

        let default_ttl_secs = parse_env_var("ERD_STUDIO_CACHE_DEFAULT_TTL", 300u64)?;
        let memory_max_entries = parse_env_var(
            "ERD_STUDIO_CACHE_MAX_ENTRIES",
            CacheConfig::default().memory_max_entries,
        )?;

        Ok(Self {
            provider,
            default_ttl: Duration::from_secs(default_ttl_secs),
            memory_max_entries,
        })
    }

    fn validate(&self) -> Result<(), ErdStudioError> {
        if self.default_ttl.as_secs() == 0 {
            return Err(ErdStudioError::ConfigurationError {
                message: "default_ttl must be greater than 0 seconds".to_string(),
                key: Some("ERD_STUDIO_CACHE_DEFAULT_TTL".to_string()),
            });
        }

        if self.memory_max_entries == 0 {
            return Err(ErdStudioError::ConfigurationError {
                message: "memory_max_entries must be greater than 0".to_string(),
                key: Some("ERD_STUDIO_CACHE_MAX_ENTRIES".to_string()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.provider, StoreProvider::Memory);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let config = CacheConfig {
            default_ttl: Duration::from_secs(0),
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = CacheConfig {
            memory_max_entries: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
