//! Error taxonomy shared across ERD Studio services
//!
//! The core emits error *kinds*; mapping a kind to a transport status code
//! happens at the service boundary, never here.

use thiserror::Error;

/// Service-wide error type
#[derive(Debug, Error)]
pub enum ErdStudioError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Human-readable description of the problem
        message: String,
        /// Environment variable the problem relates to, if known
        key: Option<String>,
    },

    /// Credentials are missing or could not be validated
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials are valid but the role is insufficient
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A referenced resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key-value store operation failed
    #[error("Store error: {0}")]
    StoreError(String),

    /// Broadcast transport operation failed
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Closed set of error kinds, used by service boundaries to pick a
/// transport status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Unauthorized,
    Forbidden,
    NotFound,
    Store,
    Transport,
    Internal,
}

impl ErdStudioError {
    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationError { .. } => ErrorKind::Configuration,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StoreError(_) => ErrorKind::Store,
            Self::TransportError(_) => ErrorKind::Transport,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a configuration error without an associated key
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            key: None,
        }
    }
}
