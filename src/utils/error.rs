//! Error handling for the cloud saver
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for the cloud saver
pub type Result<T> = std::result::Result<T, SaverError>;

/// Main error type for the cloud saver
#[derive(Error, Debug)]
pub enum SaverError {
    /// Configuration errors: fatal at construction, never retried
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication errors (bad key, failed token exchange)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Provider errors carrying the provider's own message
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// The stop-and-wait state machine ran out its overall deadline
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// The caller's cancellation signal fired; distinct from a timeout
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Unsupported operation, e.g. scale-up on a power-down-only system
    #[error("Operation not implemented: {operation}")]
    NotImplemented { operation: String },

    /// Response parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT signing errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl SaverError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    pub fn parsing(message: impl Into<String>) -> Self {
        Self::Parsing(message.into())
    }

    /// Fatal errors abort construction; everything else is retried
    /// implicitly by the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
