//! Error types shared by the price-sentinel crates.

use thiserror::Error;

/// Result alias using the sentinel [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration, loaders and internal plumbing.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A model artifact could not be used
    #[error("Model error: {0}")]
    Model(String),

    /// A statistical computation could not be carried out
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML decoding failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a statistics error
    pub fn statistics(msg: impl Into<String>) -> Self {
        Self::Statistics(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
