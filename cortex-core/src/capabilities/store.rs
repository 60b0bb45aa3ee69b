//! Vector storage behind the capability registry
//!
//! The registry never touches embeddings directly; it hands text to a
//! [`CapabilityStore`] keyed by capability name and asks it for ranked keys
//! back. [`InMemoryStore`] is the bundled implementation.

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors raised by a capability store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedding provider failed
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A stored vector and the query vector disagree on length
    #[error("embedding dimension mismatch for '{key}': expected {expected}, got {actual}")]
    DimensionMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// Backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Exact-match metadata filter: every pair must be present and equal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreFilter {
    conditions: BTreeMap<String, Value>,
}

impl StoreFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key == value`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check a metadata mapping against the filter
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// One ranked hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMatch {
    pub key: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

/// Storage contract used by the registry
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    /// Embed `text` and store it under `key`, replacing any previous entry
    async fn add(
        &self,
        key: &str,
        text: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Rank stored entries against `text`, best first, at most `top_k`
    async fn query(
        &self,
        text: &str,
        filter: Option<&StoreFilter>,
        top_k: usize,
    ) -> Result<Vec<StoreMatch>, StoreError>;

    /// Delete entries; unknown keys are ignored
    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Number of stored entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct StoreRecord {
    key: String,
    embedding: Vec<f32>,
    metadata: Map<String, Value>,
}

/// In-process store with cosine ranking
///
/// The record table is copy-on-write: writers build a new `Vec` and swap the
/// `Arc`, so a running query keeps ranking the snapshot it started with.
pub struct InMemoryStore {
    embeddings: Arc<dyn EmbeddingProvider>,
    records: RwLock<Arc<Vec<StoreRecord>>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("dimension", &self.embeddings.dimension())
            .field("records", &self.snapshot().len())
            .finish()
    }
}

impl InMemoryStore {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embeddings,
            records: RwLock::new(Arc::new(Vec::new())),
        }
    }

    fn snapshot(&self) -> Arc<Vec<StoreRecord>> {
        match self.records.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Vec<StoreRecord>)) {
        let mut guard = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = guard.as_ref().clone();
        f(&mut next);
        *guard = Arc::new(next);
    }
}

#[async_trait]
impl CapabilityStore for InMemoryStore {
    async fn add(
        &self,
        key: &str,
        text: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let embedding = self
            .embeddings
            .embed(text)
            .await
            .map_err(|e| StoreError::Embedding(e.to_string()))?;

        let expected = self.embeddings.dimension();
        if embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                key: key.to_string(),
                expected,
                actual: embedding.len(),
            });
        }

        let record = StoreRecord {
            key: key.to_string(),
            embedding,
            metadata: metadata.clone(),
        };
        self.update(|records| match records.iter_mut().find(|r| r.key == record.key) {
            Some(existing) => *existing = record,
            None => records.push(record),
        });
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        filter: Option<&StoreFilter>,
        top_k: usize,
    ) -> Result<Vec<StoreMatch>, StoreError> {
        let records = self.snapshot();
        if top_k == 0 || records.is_empty() {
            return Ok(Vec::new());
        }

        let query = self
            .embeddings
            .embed(text)
            .await
            .map_err(|e| StoreError::Embedding(e.to_string()))?;

        let mut scored = Vec::with_capacity(records.len());
        for record in records.iter() {
            if let Some(filter) = filter
                && !filter.matches(&record.metadata)
            {
                continue;
            }
            if record.embedding.len() != query.len() {
                return Err(StoreError::DimensionMismatch {
                    key: record.key.clone(),
                    expected: record.embedding.len(),
                    actual: query.len(),
                });
            }
            let score = cosine_similarity(&query, &record.embedding);
            // a NaN from a bad embedding ranks below every real match
            let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
            scored.push((record, score));
        }

        // Stable sort keeps registration order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(record, score)| StoreMatch {
                key: record.key.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|records| records.retain(|r| !keys.contains(&r.key.as_str())));
        Ok(())
    }

    fn len(&self) -> usize {
        self.snapshot().len()
    }
}

/// Cosine similarity; a zero vector scores 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbeddings;
    use serde_json::json;

    fn store() -> InMemoryStore {
        InMemoryStore::new(Arc::new(HashingEmbeddings::default()))
    }

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let store = store();
        store
            .add("weather", "fetch the weather forecast for a city", &Map::new())
            .await
            .unwrap();
        store
            .add("calculator", "add subtract multiply numbers", &Map::new())
            .await
            .unwrap();

        let hits = store.query("multiply two numbers", None, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, "calculator");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = store();
        for key in ["first", "second", "third"] {
            store.add(key, "identical text", &Map::new()).await.unwrap();
        }

        let keys: Vec<String> = store
            .query("identical text", None, 3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_filter_and_delete() {
        let store = store();
        store
            .add("a", "text tools", &meta(json!({"group": "text"})))
            .await
            .unwrap();
        store
            .add("b", "text tools", &meta(json!({"group": "math"})))
            .await
            .unwrap();

        let filter = StoreFilter::new().with("group", "math");
        let hits = store.query("text", Some(&filter), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "b");

        store.delete(&["b", "missing"]).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.query("text", Some(&filter), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_replaces_existing_key() {
        let store = store();
        store.add("a", "one", &Map::new()).await.unwrap();
        store
            .add("a", "two", &meta(json!({"v": 2})))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let hits = store.query("two", None, 1).await.unwrap();
        assert_eq!(hits[0].metadata.get("v"), Some(&json!(2)));
    }

    struct NanEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for NanEmbeddings {
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            if text == "broken" {
                Ok(vec![f32::NAN; 4])
            } else {
                Ok(vec![1.0, 0.0, 0.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn test_nan_scores_rank_last() {
        let store = InMemoryStore::new(Arc::new(NanEmbeddings));
        store.add("broken", "broken", &Map::new()).await.unwrap();
        store.add("healthy", "healthy", &Map::new()).await.unwrap();

        let hits = store.query("anything", None, 2).await.unwrap();
        assert_eq!(hits[0].key, "healthy");
        assert_eq!(hits[1].key, "broken");
        assert_eq!(hits[1].score, f32::NEG_INFINITY);
    }

    #[tokio::test]
    async fn test_zero_top_k() {
        let store = store();
        store.add("a", "anything", &Map::new()).await.unwrap();
        assert!(store.query("anything", None, 0).await.unwrap().is_empty());
    }
}
