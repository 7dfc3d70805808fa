//! Mutation-to-scope resolution
//!
//! A mutation arrives as the set of table ids it touched. All entities in
//! one mutation are assumed to belong to one scope, so any member of the
//! set resolves it; this is a caller invariant and is not re-validated
//! here. Resolution walks table → schema → project, one external lookup
//! per step. Contexts are resolved per broadcast and never cached: tables
//! can move between schemas.

use crate::hierarchy::{HierarchyError, SchemaHierarchy};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Delivery scope (project) and display scope (schema) of a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeContext {
    /// Broadcast partition key
    pub project_id: String,
    /// Finer-grained id carried inside payloads
    pub schema_id: String,
}

/// Resolution failures; the broadcaster treats all of them as "drop this
/// broadcast and log", never as a caller-visible error
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Affected entity set is empty")]
    EmptyAffectedSet,

    #[error("No owning scope found for entity {0}")]
    UnknownEntity(String),

    #[error(transparent)]
    Lookup(#[from] HierarchyError),
}

/// Resolves mutations to their delivery scope
pub struct MutationResolver {
    hierarchy: Arc<dyn SchemaHierarchy>,
}

impl MutationResolver {
    pub fn new(hierarchy: Arc<dyn SchemaHierarchy>) -> Self {
        Self { hierarchy }
    }

    /// Resolve from the affected table set
    pub async fn resolve_tables(
        &self,
        affected: &BTreeSet<String>,
    ) -> Result<ScopeContext, ResolveError> {
        let table_id = affected.iter().next().ok_or(ResolveError::EmptyAffectedSet)?;

        let schema_id = self
            .hierarchy
            .schema_of_table(table_id)
            .await?
            .ok_or_else(|| ResolveError::UnknownEntity(table_id.clone()))?;

        self.resolve_schema(&schema_id).await
    }

    /// Resolve from a known schema id, skipping the table walk (coarse
    /// events)
    pub async fn resolve_schema(&self, schema_id: &str) -> Result<ScopeContext, ResolveError> {
        let project_id = self
            .hierarchy
            .project_of_schema(schema_id)
            .await?
            .ok_or_else(|| ResolveError::UnknownEntity(schema_id.to_string()))?;

        Ok(ScopeContext {
            project_id,
            schema_id: schema_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticHierarchy {
        table_parents: HashMap<String, String>,
        schema_parents: HashMap<String, String>,
    }

    #[async_trait]
    impl SchemaHierarchy for StaticHierarchy {
        async fn schema_of_table(
            &self,
            table_id: &str,
        ) -> Result<Option<String>, HierarchyError> {
            Ok(self.table_parents.get(table_id).cloned())
        }

        async fn project_of_schema(
            &self,
            schema_id: &str,
        ) -> Result<Option<String>, HierarchyError> {
            Ok(self.schema_parents.get(schema_id).cloned())
        }
    }

    struct FailingHierarchy;

    #[async_trait]
    impl SchemaHierarchy for FailingHierarchy {
        async fn schema_of_table(&self, _: &str) -> Result<Option<String>, HierarchyError> {
            Err(HierarchyError::Status(500))
        }

        async fn project_of_schema(&self, _: &str) -> Result<Option<String>, HierarchyError> {
            Err(HierarchyError::Status(500))
        }
    }

    fn fixture() -> MutationResolver {
        let hierarchy = StaticHierarchy {
            table_parents: [("t1", "sch-1"), ("t2", "sch-1")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            schema_parents: [("sch-1", "proj-1")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        MutationResolver::new(Arc::new(hierarchy))
    }

    fn ids(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolves_through_hierarchy() {
        let resolver = fixture();

        let ctx = resolver.resolve_tables(&ids(&["t1", "t2"])).await.unwrap();
        assert_eq!(ctx.project_id, "proj-1");
        assert_eq!(ctx.schema_id, "sch-1");
    }

    #[tokio::test]
    async fn test_empty_set_is_an_error() {
        let resolver = fixture();

        let err = resolver.resolve_tables(&BTreeSet::new()).await.unwrap_err();
        assert!(matches!(err, ResolveError::EmptyAffectedSet));
    }

    #[tokio::test]
    async fn test_unknown_table_terminates_resolution() {
        let resolver = fixture();

        let err = resolver.resolve_tables(&ids(&["t-unknown"])).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownEntity(id) if id == "t-unknown"));
    }

    #[tokio::test]
    async fn test_orphan_schema_terminates_resolution() {
        let hierarchy = StaticHierarchy {
            table_parents: [("t1".to_string(), "sch-orphan".to_string())]
                .into_iter()
                .collect(),
            schema_parents: HashMap::new(),
        };
        let resolver = MutationResolver::new(Arc::new(hierarchy));

        let err = resolver.resolve_tables(&ids(&["t1"])).await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownEntity(id) if id == "sch-orphan"));
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let resolver = MutationResolver::new(Arc::new(FailingHierarchy));

        let err = resolver.resolve_tables(&ids(&["t1"])).await.unwrap_err();
        assert!(matches!(err, ResolveError::Lookup(_)));
    }

    #[tokio::test]
    async fn test_coarse_resolution_skips_table_walk() {
        let resolver = fixture();

        let ctx = resolver.resolve_schema("sch-1").await.unwrap();
        assert_eq!(ctx.project_id, "proj-1");
        assert_eq!(ctx.schema_id, "sch-1");
    }
}
