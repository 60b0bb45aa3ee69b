//! Error types for Cortex operations

use crate::capabilities::RegistryError;

/// Result type for Cortex operations
pub type Result<T> = std::result::Result<T, CortexError>;

/// Error types for the Cortex runtime
#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Capability registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Model collaborator failed to produce a reasoning turn
    #[error("Model error: {0}")]
    Model(String),

    /// Embedding provider failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for CortexError {
    fn from(s: String) -> Self {
        CortexError::Other(s)
    }
}

impl From<&str> for CortexError {
    fn from(s: &str) -> Self {
        CortexError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for CortexError {
    fn from(err: anyhow::Error) -> Self {
        CortexError::Other(err.to_string())
    }
}
