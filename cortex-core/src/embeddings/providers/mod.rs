//! Embedding provider implementations

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding provider implementations.
///
/// A provider maps text to a fixed-length vector. The registry only relies
/// on every vector from one provider having the same dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    ///
    /// Returns one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Get the dimension of embeddings produced by this provider.
    fn dimension(&self) -> usize;
}

pub mod hashing;

pub use hashing::HashingEmbeddings;

#[cfg(feature = "embeddings-local")]
pub mod local;

#[cfg(feature = "embeddings-local")]
pub use local::LocalEmbeddings;
