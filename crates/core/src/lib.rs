//! # ERD Studio Core
//!
//! Shared building blocks for the ERD Studio realtime platform.
//!
//! ## Modules
//!
//! - `error`: Error taxonomy shared across services
//! - `config`: Configuration loading and validation
//! - `auth`: Authentication context, roles, and the session resolver seam

pub mod auth;
pub mod config;
pub mod error;

pub use auth::{has_minimum_role, AuthContext, Role, SessionResolver};
pub use config::{load_dotenv, ConfigLoader, RedisConfig, ServiceConfig};
pub use error::{ErdStudioError, ErrorKind};

/// Result type alias for ERD Studio operations
pub type Result<T> = std::result::Result<T, ErdStudioError>;
