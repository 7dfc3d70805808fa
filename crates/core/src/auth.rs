//! Authentication context and role checks
//!
//! Authorization is an explicit predicate invoked at each entry point: no
//! middleware interception, no ambient state. Contexts are attached to a
//! connection at upgrade time and never mutated afterwards; a revoked role
//! takes effect when the client reconnects.

use crate::error::ErdStudioError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Member role within a project, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access to diagrams and live updates
    Viewer,
    /// May mutate the model
    Editor,
    /// Full control, including membership
    Owner,
}

/// Authentication context attached to a live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Subject (member) identifier
    pub user_id: String,
    /// Granted role
    pub role: Role,
}

/// Check that a context carries at least the required role
pub fn has_minimum_role(ctx: &AuthContext, required: Role) -> bool {
    ctx.role >= required
}

/// Resolves upgrade credentials to an authentication context.
///
/// Implementations validate the presented bearer token. Lookup failures are
/// fail-closed: a token that cannot be verified is treated as unauthorized,
/// never as anonymous.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve a bearer token to its authentication context
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for unknown or expired tokens, `StoreError`
    /// when the backing lookup itself fails.
    async fn resolve(&self, token: &str) -> Result<AuthContext, ErdStudioError>;
}
