//! Containment hierarchy lookups
//!
//! The schema service owns the entity hierarchy (project ⊃ schema ⊃ table).
//! This module is the seam to it: one lookup per resolution step, `None`
//! when the entity has no owning parent (deleted or never existed).

use async_trait::async_trait;
use erd_studio_core::config::{parse_env_var, ConfigLoader};
use erd_studio_core::error::ErdStudioError;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors from hierarchy lookups
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("Hierarchy lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Hierarchy lookup returned status {0}")]
    Status(u16),
}

/// Resolves an entity id to its immediate parent in the containment
/// hierarchy
#[async_trait]
pub trait SchemaHierarchy: Send + Sync {
    /// Schema owning a table, or `None` if the table is unknown
    async fn schema_of_table(&self, table_id: &str) -> Result<Option<String>, HierarchyError>;

    /// Project owning a schema, or `None` if the schema is unknown
    async fn project_of_schema(&self, schema_id: &str) -> Result<Option<String>, HierarchyError>;
}

/// Schema service client configuration
///
/// # Environment Variables
///
/// - `ERD_STUDIO_SCHEMA_SERVICE_URL` (optional): Base URL (default: "http://localhost:8081")
/// - `ERD_STUDIO_SCHEMA_SERVICE_TIMEOUT` (optional): Request timeout in seconds (default: 3)
#[derive(Debug, Clone)]
pub struct HierarchyConfig {
    /// Schema service base URL
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            request_timeout: Duration::from_secs(3),
        }
    }
}

impl ConfigLoader for HierarchyConfig {
    fn from_env() -> Result<Self, ErdStudioError> {
        let base_url = std::env::var("ERD_STUDIO_SCHEMA_SERVICE_URL")
            .unwrap_or_else(|_| HierarchyConfig::default().base_url);

        let timeout_secs = parse_env_var("ERD_STUDIO_SCHEMA_SERVICE_TIMEOUT", 3u64)?;

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), ErdStudioError> {
        url::Url::parse(&self.base_url).map_err(|e| ErdStudioError::ConfigurationError {
            message: format!("Invalid schema service URL: {}", e),
            key: Some("ERD_STUDIO_SCHEMA_SERVICE_URL".to_string()),
        })?;

        if self.request_timeout.as_secs() == 0 {
            return Err(ErdStudioError::ConfigurationError {
                message: "request_timeout must be greater than 0 seconds".to_string(),
                key: Some("ERD_STUDIO_SCHEMA_SERVICE_TIMEOUT".to_string()),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ParentResponse {
    #[serde(rename = "parentId")]
    parent_id: String,
}

/// HTTP client against the schema service's internal hierarchy endpoints
pub struct HttpSchemaHierarchy {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSchemaHierarchy {
    /// Build a client with the configured request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &HierarchyConfig) -> Result<Self, HierarchyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn lookup_parent(&self, path: &str) -> Result<Option<String>, HierarchyError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => {
                let parent: ParentResponse = response.json().await?;
                Ok(Some(parent.parent_id))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(HierarchyError::Status(status.as_u16())),
        }
    }
}

#[async_trait]
impl SchemaHierarchy for HttpSchemaHierarchy {
    async fn schema_of_table(&self, table_id: &str) -> Result<Option<String>, HierarchyError> {
        self.lookup_parent(&format!("/internal/v1/tables/{}/parent", table_id))
            .await
    }

    async fn project_of_schema(&self, schema_id: &str) -> Result<Option<String>, HierarchyError> {
        self.lookup_parent(&format!("/internal/v1/schemas/{}/parent", schema_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_validate() {
        let config = HierarchyConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_url() {
        let config = HierarchyConfig {
            base_url: "not a url".to_string(),
            ..HierarchyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = HierarchyConfig {
            base_url: "http://schema:8081/".to_string(),
            ..HierarchyConfig::default()
        };
        let client = HttpSchemaHierarchy::new(&config).unwrap();
        assert_eq!(client.base_url, "http://schema:8081");
    }
}
