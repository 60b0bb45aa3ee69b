//! Factory for creating embedding providers from configuration

use crate::config::{EmbeddingProviderKind, EmbeddingsConfig};
use crate::embeddings::providers::{EmbeddingProvider, HashingEmbeddings};
use crate::error::Result;
use std::sync::Arc;

#[cfg(feature = "embeddings-local")]
use crate::embeddings::providers::LocalEmbeddings;

/// Factory for creating embedding providers
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    /// Create an embedding provider from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created
    pub fn create(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        match config.provider {
            EmbeddingProviderKind::Hashing => {
                Ok(Arc::new(HashingEmbeddings::new(config.dimension)?))
            }

            #[cfg(feature = "embeddings-local")]
            EmbeddingProviderKind::Local => {
                let provider = LocalEmbeddings::new(config.model.clone())?;
                Ok(Arc::new(provider))
            }

            #[cfg(not(feature = "embeddings-local"))]
            EmbeddingProviderKind::Local => Err(crate::error::CortexError::Configuration(
                "Local embeddings require 'embeddings-local' feature".to_string(),
            )),
        }
    }

    /// Create from an optional config section, falling back to hashing
    /// embeddings with the default dimension.
    pub fn from_config(config: Option<&EmbeddingsConfig>) -> Result<Arc<dyn EmbeddingProvider>> {
        match config {
            Some(cfg) => Self::create(cfg),
            None => Ok(Arc::new(HashingEmbeddings::default())),
        }
    }
}
