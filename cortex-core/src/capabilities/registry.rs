//! Capability registry: registration, lookup and semantic discovery
//!
//! The registry provides:
//! - Registration with duplicate and empty-description checks
//! - Exact-name lookup of descriptors and handlers
//! - Embedding search through a pluggable [`CapabilityStore`]
//! - A per-session discovery set of names already advertised
//!
//! # Example
//!
//! ```rust,ignore
//! use cortex_core::capabilities::{CapabilityRegistry, CapabilityDescriptor};
//! use cortex_core::embeddings::HashingEmbeddings;
//!
//! let registry = CapabilityRegistry::new(Arc::new(HashingEmbeddings::default()));
//! registry
//!     .register(CapabilityDescriptor::new("summarize", "Summarize text", handler))
//!     .await?;
//!
//! let hits = registry.search("shorten a paragraph", 5).await?;
//! ```

use super::descriptor::{CapabilityDescriptor, CapabilityMatch, CapabilitySummary};
use super::store::{CapabilityStore, InMemoryStore, StoreError, StoreFilter, StoreMatch};
use crate::embeddings::EmbeddingProvider;
use crate::tools::BoxedHandler;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Error type for registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An entry with this name already exists
    #[error("'{0}' is already registered")]
    Duplicate(String),

    /// Description is empty, so nothing can be embedded
    #[error("capability '{0}' has no description")]
    MissingDescription(String),

    #[error("capability '{0}' not found")]
    NotFound(String),

    /// The embedding provider failed
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Embedding(message) => RegistryError::Embedding(message),
            other => RegistryError::Store(other),
        }
    }
}

#[derive(Default)]
struct Entries {
    by_name: HashMap<String, Arc<CapabilityDescriptor>>,
    order: Vec<String>,
}

#[derive(Default)]
struct DiscoverySet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl DiscoverySet {
    fn insert(&mut self, name: &str) {
        if self.members.insert(name.to_string()) {
            self.order.push(name.to_string());
        }
    }

    fn remove(&mut self, name: &str) {
        if self.members.remove(name) {
            self.order.retain(|n| n != name);
        }
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// Shared registry of capabilities
pub struct CapabilityRegistry {
    entries: RwLock<Entries>,
    store: Arc<dyn CapabilityStore>,
    discovered: Mutex<DiscoverySet>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("stored", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl CapabilityRegistry {
    /// Registry backed by an [`InMemoryStore`] over the given embeddings
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new(embeddings)))
    }

    /// Registry over any store implementation
    pub fn with_store(store: Arc<dyn CapabilityStore>) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            store,
            discovered: Mutex::new(DiscoverySet::default()),
        }
    }

    /// Register a capability and store its embedding
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name, an empty description, or a store failure.
    pub async fn register(&self, descriptor: CapabilityDescriptor) -> Result<(), RegistryError> {
        if descriptor.description.trim().is_empty() {
            return Err(RegistryError::MissingDescription(descriptor.name));
        }

        // Held across the store write so check-then-insert is atomic
        let mut entries = self.entries.write().await;
        if entries.by_name.contains_key(&descriptor.name) {
            return Err(RegistryError::Duplicate(descriptor.name));
        }

        self.store
            .add(&descriptor.name, &descriptor.description, &descriptor.metadata)
            .await?;

        tracing::debug!(capability = %descriptor.name, "Registered capability");
        entries.order.push(descriptor.name.clone());
        entries
            .by_name
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Register several capabilities, stopping at the first failure
    pub async fn register_all(
        &self,
        descriptors: impl IntoIterator<Item = CapabilityDescriptor>,
    ) -> Result<(), RegistryError> {
        for descriptor in descriptors {
            self.register(descriptor).await?;
        }
        Ok(())
    }

    /// Remove a capability, its embedding and its discovery mark
    pub async fn remove(&self, name: &str) -> Result<Arc<CapabilityDescriptor>, RegistryError> {
        let mut entries = self.entries.write().await;
        if !entries.by_name.contains_key(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }

        self.store.delete(&[name]).await?;

        entries.order.retain(|n| n != name);
        let removed = entries
            .by_name
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        drop(entries);

        self.discovered.lock().await.remove(name);
        tracing::debug!(capability = %name, "Removed capability");
        Ok(removed)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<CapabilityDescriptor>> {
        self.entries.read().await.by_name.get(name).cloned()
    }

    /// Exact-name handler lookup
    pub async fn handler(&self, name: &str) -> Option<BoxedHandler> {
        self.get(name).await.map(|d| Arc::clone(&d.handler))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.by_name.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Summaries in registration order
    pub async fn list(&self) -> Vec<CapabilitySummary> {
        let entries = self.entries.read().await;
        entries
            .order
            .iter()
            .filter_map(|name| entries.by_name.get(name))
            .map(|d| CapabilitySummary {
                name: d.name.clone(),
                description: d.description.clone(),
            })
            .collect()
    }

    /// Up to `top_k` capabilities ranked by similarity to `query`
    ///
    /// Returned names are added to the discovery set.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<CapabilityMatch>, RegistryError> {
        self.search_inner(query, None, top_k, false).await
    }

    /// Like [`search`](Self::search), restricted by metadata
    pub async fn search_filtered(
        &self,
        query: &str,
        filter: &StoreFilter,
        top_k: usize,
    ) -> Result<Vec<CapabilityMatch>, RegistryError> {
        self.search_inner(query, Some(filter), top_k, false).await
    }

    /// Like [`search`](Self::search), skipping names already discovered
    pub async fn search_undiscovered(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<CapabilityMatch>, RegistryError> {
        self.search_inner(query, None, top_k, true).await
    }

    /// Discovered names in the order they were first surfaced
    pub async fn discovered(&self) -> Vec<String> {
        self.discovered.lock().await.order.clone()
    }

    pub async fn is_discovered(&self, name: &str) -> bool {
        self.discovered.lock().await.members.contains(name)
    }

    /// Forget which capabilities have been advertised
    pub async fn reset_discovery(&self) {
        self.discovered.lock().await.clear();
    }

    async fn search_inner(
        &self,
        query: &str,
        filter: Option<&StoreFilter>,
        top_k: usize,
        skip_discovered: bool,
    ) -> Result<Vec<CapabilityMatch>, RegistryError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        if entries.order.is_empty() {
            return Ok(Vec::new());
        }

        let mut discovered = self.discovered.lock().await;
        let fetch = if skip_discovered {
            entries.order.len()
        } else {
            top_k
        };
        let ranked: Vec<StoreMatch> = self.store.query(query, filter, fetch).await?;

        let matches: Vec<CapabilityMatch> = ranked
            .into_iter()
            .filter(|m| !(skip_discovered && discovered.members.contains(&m.key)))
            .filter_map(|m| {
                entries.by_name.get(&m.key).map(|d| CapabilityMatch {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    instruction: d.instruction.clone(),
                    score: m.score,
                })
            })
            .take(top_k)
            .collect();

        for hit in &matches {
            discovered.insert(&hit.name);
        }

        tracing::debug!(query = %query, hits = matches.len(), "Capability search");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbeddings;
    use crate::error::{CortexError, Result as CortexResult};
    use crate::tools::FnHandler;
    use async_trait::async_trait;
    use serde_json::json;

    fn handler() -> BoxedHandler {
        Arc::new(FnHandler::new(|_, _| Ok(json!("ok"))))
    }

    fn capability(name: &str, description: &str) -> CapabilityDescriptor {
        CapabilityDescriptor::new(name, description, handler())
            .with_instruction(format!("use capability:{}|run|{{}}", name))
    }

    async fn sample_registry() -> CapabilityRegistry {
        let registry = CapabilityRegistry::new(Arc::new(HashingEmbeddings::default()));
        registry
            .register_all(vec![
                capability("calculator", "add subtract multiply and divide numbers"),
                capability("weather", "fetch the weather forecast for a city"),
                capability("summarize", "summarize a long block of text"),
            ])
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let registry = sample_registry().await;
        let err = registry
            .register(capability("weather", "another weather service"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "weather"));
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_missing_description() {
        let registry = CapabilityRegistry::new(Arc::new(HashingEmbeddings::default()));
        let err = registry
            .register(capability("blank", "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingDescription(name) if name == "blank"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_in_registration_order() {
        let registry = sample_registry().await;
        let names: Vec<String> = registry.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["calculator", "weather", "summarize"]);
    }

    #[tokio::test]
    async fn test_search_ranks_and_marks_discovered() {
        let registry = sample_registry().await;

        let hits = registry.search("multiply numbers", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "calculator");
        assert!(hits[0].score >= hits[1].score);

        for hit in &hits {
            assert!(registry.is_discovered(&hit.name).await);
        }
        assert_eq!(registry.discovered().await.len(), 2);

        registry.reset_discovery().await;
        assert!(registry.discovered().await.is_empty());
    }

    #[tokio::test]
    async fn test_search_edge_cases() {
        let empty = CapabilityRegistry::new(Arc::new(HashingEmbeddings::default()));
        assert!(empty.search("anything", 5).await.unwrap().is_empty());

        let registry = sample_registry().await;
        assert!(registry.search("numbers", 0).await.unwrap().is_empty());
        assert!(registry.discovered().await.is_empty());

        let all = registry.search("numbers", 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_search_filtered() {
        let registry = CapabilityRegistry::new(Arc::new(HashingEmbeddings::default()));
        registry
            .register(capability("upper", "transform text").with_metadata("group", "text"))
            .await
            .unwrap();
        registry
            .register(capability("sum", "transform numbers").with_metadata("group", "math"))
            .await
            .unwrap();

        let filter = StoreFilter::new().with("group", "math");
        let hits = registry
            .search_filtered("transform text", &filter, 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "sum");
    }

    #[tokio::test]
    async fn test_search_undiscovered_skips_advertised() {
        let registry = sample_registry().await;
        let first = registry.search("multiply numbers", 1).await.unwrap();
        assert_eq!(first[0].name, "calculator");

        let next = registry
            .search_undiscovered("multiply numbers", 1)
            .await
            .unwrap();
        assert_eq!(next.len(), 1);
        assert_ne!(next[0].name, "calculator");
        assert_eq!(registry.discovered().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = sample_registry().await;
        registry.search("weather forecast", 1).await.unwrap();
        assert!(registry.is_discovered("weather").await);

        let removed = registry.remove("weather").await.unwrap();
        assert_eq!(removed.name, "weather");
        assert!(registry.get("weather").await.is_none());
        assert!(!registry.is_discovered("weather").await);

        let err = registry.remove("weather").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));

        let hits = registry.search("weather forecast", 5).await.unwrap();
        assert!(hits.iter().all(|h| h.name != "weather"));
    }

    struct FailingEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbeddings {
        async fn embed(&self, _text: &str) -> CortexResult<Vec<f32>> {
            Err(CortexError::Embedding("model offline".to_string()))
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    fn numbered_description(i: usize) -> String {
        format!("task{i} alpha{i} beta{i}")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_keep_name_embedding_mapping() {
        let registry = Arc::new(CapabilityRegistry::new(Arc::new(HashingEmbeddings::default())));

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..40 {
                    let name = format!("cap_{i}");
                    registry
                        .register(capability(&name, &numbered_description(i)))
                        .await
                        .unwrap();
                    if i % 3 == 0 {
                        registry.remove(&name).await.unwrap();
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|offset| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    for round in 0..60 {
                        let target = (round + offset * 7) % 40;
                        let expected = format!("cap_{target}");
                        let hits = registry
                            .search(&numbered_description(target), 3)
                            .await
                            .unwrap();

                        for hit in &hits {
                            let index: usize = hit.name["cap_".len()..].parse().unwrap();
                            assert_eq!(hit.description, numbered_description(index));
                            assert_eq!(
                                hit.instruction,
                                format!("use capability:{}|run|{{}}", hit.name)
                            );
                        }
                        // an exact description match must outrank everything else
                        if hits.iter().any(|h| h.name == expected) {
                            assert_eq!(hits[0].name, expected);
                            assert!((hits[0].score - 1.0).abs() < 1e-4);
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        assert_eq!(registry.len().await, 26);
        for i in (0..40).filter(|i| i % 3 != 0) {
            let hits = registry.search(&numbered_description(i), 1).await.unwrap();
            assert_eq!(hits[0].name, format!("cap_{i}"));
            assert!(registry.get(&hits[0].name).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces() {
        let registry = CapabilityRegistry::new(Arc::new(FailingEmbeddings));
        let err = registry
            .register(capability("x", "does things"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Embedding(msg) if msg.contains("model offline")));
        assert!(registry.get("x").await.is_none());
    }
}
