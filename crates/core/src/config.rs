//! Shared configuration loader module for ERD Studio services
//!
//! Provides a unified configuration loading system with environment variable
//! parsing, validation, and support for .env files. All configuration uses the
//! `ERD_STUDIO_` prefix for environment variables, with unprefixed fallbacks
//! for the common deployment variables (`PORT`, `REDIS_URL`, `RUST_LOG`).
//!
//! # Example
//!
//! ```no_run
//! use erd_studio_core::config::{load_dotenv, ConfigLoader, RedisConfig, ServiceConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! load_dotenv();
//!
//! let service_config = ServiceConfig::from_env()?;
//! let redis_config = RedisConfig::from_env()?;
//!
//! service_config.validate()?;
//! redis_config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::ErdStudioError;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration from
/// environment variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if required variables are missing or
    /// values cannot be parsed.
    fn from_env() -> Result<Self, ErdStudioError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if any validation check fails.
    fn validate(&self) -> Result<(), ErdStudioError>;
}

/// Redis configuration
///
/// Connection settings for the network-shared store provider and the
/// broadcast transport. Timeouts are deliberately short: shared-store access
/// must fail fast rather than stall a write path.
///
/// # Environment Variables
///
/// - `ERD_STUDIO_REDIS_URL` (required): Redis connection URL
/// - `ERD_STUDIO_REDIS_CONNECTION_TIMEOUT` (optional): Connection timeout in seconds (default: 5)
/// - `ERD_STUDIO_REDIS_RESPONSE_TIMEOUT` (optional): Per-command timeout in seconds (default: 2)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Connection establishment timeout
    pub connection_timeout: Duration,
    /// Per-command response timeout
    pub response_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            connection_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(2),
        }
    }
}

impl ConfigLoader for RedisConfig {
    fn from_env() -> Result<Self, ErdStudioError> {
        let url = std::env::var("ERD_STUDIO_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .unwrap_or_else(|_| RedisConfig::default().url);

        let connection_timeout_secs = parse_env_var("ERD_STUDIO_REDIS_CONNECTION_TIMEOUT", 5u64)?;
        let response_timeout_secs = parse_env_var("ERD_STUDIO_REDIS_RESPONSE_TIMEOUT", 2u64)?;

        Ok(Self {
            url,
            connection_timeout: Duration::from_secs(connection_timeout_secs),
            response_timeout: Duration::from_secs(response_timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), ErdStudioError> {
        Url::parse(&self.url).map_err(|e| ErdStudioError::ConfigurationError {
            message: format!("Invalid REDIS_URL: {}", e),
            key: Some("ERD_STUDIO_REDIS_URL".to_string()),
        })?;

        if self.connection_timeout.as_secs() == 0 {
            return Err(ErdStudioError::ConfigurationError {
                message: "connection_timeout must be greater than 0 seconds".to_string(),
                key: Some("ERD_STUDIO_REDIS_CONNECTION_TIMEOUT".to_string()),
            });
        }

        if self.response_timeout.as_secs() == 0 {
            return Err(ErdStudioError::ConfigurationError {
                message: "response_timeout must be greater than 0 seconds".to_string(),
                key: Some("ERD_STUDIO_REDIS_RESPONSE_TIMEOUT".to_string()),
            });
        }

        Ok(())
    }
}

/// Service configuration
///
/// # Environment Variables
///
/// - `ERD_STUDIO_SERVICE_HOST` (optional): Bind host (default: "0.0.0.0")
/// - `ERD_STUDIO_SERVICE_PORT` (optional): Bind port (default: 8085)
/// - `ERD_STUDIO_SERVICE_LOG_LEVEL` (optional): Log level (default: "info")
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service bind host
    pub host: String,
    /// Service bind port
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8085,
            log_level: "info".to_string(),
        }
    }
}

impl ConfigLoader for ServiceConfig {
    fn from_env() -> Result<Self, ErdStudioError> {
        let host = std::env::var("ERD_STUDIO_SERVICE_HOST")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| ServiceConfig::default().host);

        let port = parse_env_var("ERD_STUDIO_SERVICE_PORT", ServiceConfig::default().port)
            .or_else(|_| parse_env_var("PORT", ServiceConfig::default().port))?;

        let log_level = std::env::var("ERD_STUDIO_SERVICE_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| ServiceConfig::default().log_level);

        Ok(Self {
            host,
            port,
            log_level,
        })
    }

    fn validate(&self) -> Result<(), ErdStudioError> {
        if self.port == 0 {
            return Err(ErdStudioError::ConfigurationError {
                message: "port must be greater than 0".to_string(),
                key: Some("ERD_STUDIO_SERVICE_PORT".to_string()),
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ErdStudioError::ConfigurationError {
                message: format!(
                    "Invalid log_level '{}'. Must be one of: {}",
                    self.log_level,
                    valid_log_levels.join(", ")
                ),
                key: Some("ERD_STUDIO_SERVICE_LOG_LEVEL".to_string()),
            });
        }

        Ok(())
    }
}

/// Helper function to parse an environment variable with a default value
///
/// # Errors
///
/// Returns a `ConfigurationError` if the value is set but cannot be parsed.
pub fn parse_env_var<T>(key: &str, default: T) -> Result<T, ErdStudioError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>().map_err(|e| ErdStudioError::ConfigurationError {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            })
        })
        .unwrap_or(Ok(default))
}

/// Load .env file if present
///
/// Does not return an error if the .env file is not found.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_redis_config_default() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://localhost:6379/0");
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.response_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_config_rejects_invalid_url() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            ..RedisConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid REDIS_URL"));
    }

    #[test]
    fn test_redis_config_rejects_zero_timeout() {
        let config = RedisConfig {
            response_timeout: Duration::from_secs(0),
            ..RedisConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_service_config_default() {
        let config = ServiceConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8085);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_service_config_rejects_zero_port() {
        let config = ServiceConfig {
            port: 0,
            ..ServiceConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_service_config_rejects_bad_log_level() {
        let config = ServiceConfig {
            log_level: "verbose".to_string(),
            ..ServiceConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn test_parse_env_var_uses_default_when_unset() {
        env::remove_var("ERD_STUDIO_TEST_UNSET_VAR");
        let value: u16 = parse_env_var("ERD_STUDIO_TEST_UNSET_VAR", 42u16).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_var_rejects_garbage() {
        env::set_var("ERD_STUDIO_TEST_GARBAGE_VAR", "not-a-number");
        let result: Result<u16, _> = parse_env_var("ERD_STUDIO_TEST_GARBAGE_VAR", 1u16);
        assert!(result.is_err());
        env::remove_var("ERD_STUDIO_TEST_GARBAGE_VAR");
    }
}
