//! Local embedding provider using fastembed

use crate::error::{CortexError, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use super::EmbeddingProvider;

/// Local embedding provider using fastembed (runs locally, no API needed).
pub struct LocalEmbeddings {
    model: Mutex<fastembed::TextEmbedding>,
    dimension: usize,
}

impl LocalEmbeddings {
    /// Create a provider for a named model (e.g. "all-MiniLM-L6-v2").
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or the model cannot be loaded.
    pub fn new(model_name: impl Into<String>) -> Result<Self> {
        let model_name = model_name.into();

        let (embedding_model, dimension) = match model_name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "all_minilm_l6_v2" => {
                (fastembed::EmbeddingModel::AllMiniLML6V2, 384)
            }
            "all-minilm-l12-v2" | "all_minilm_l12_v2" => {
                (fastembed::EmbeddingModel::AllMiniLML12V2, 384)
            }
            "bge-small-en-v1.5" | "bge_small_en_v15" => {
                (fastembed::EmbeddingModel::BGESmallENV15, 384)
            }
            "bge-base-en-v1.5" | "bge_base_en_v15" => {
                (fastembed::EmbeddingModel::BGEBaseENV15, 768)
            }
            "bge-large-en-v1.5" | "bge_large_en_v15" => {
                (fastembed::EmbeddingModel::BGELargeENV15, 1024)
            }
            _ => {
                return Err(CortexError::Configuration(format!(
                    "Unsupported local embedding model '{}'. Supported: all-MiniLM-L6-v2, \
                     all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5",
                    model_name
                )));
            }
        };

        // InitOptions is non-exhaustive
        let mut init_options = fastembed::InitOptions::default();
        init_options.model_name = embedding_model;

        let model = fastembed::TextEmbedding::try_new(init_options).map_err(|e| {
            CortexError::Configuration(format!(
                "Failed to load embedding model '{}': {}",
                model_name, e
            ))
        })?;

        Ok(Self {
            model: Mutex::new(model),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch
            .pop()
            .ok_or_else(|| CortexError::Embedding("embedding model returned no vector".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        let mut model = self
            .model
            .lock()
            .map_err(|e| CortexError::Embedding(format!("Failed to lock embedding model: {}", e)))?;

        model
            .embed(texts, None)
            .map_err(|e| CortexError::Embedding(format!("Failed to generate embeddings: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
