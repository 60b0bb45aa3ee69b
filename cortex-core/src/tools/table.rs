//! Tool table: exact-name lookup for the agent's own tools
//!
//! Tools are addressed with `use tool:<name>|...`. Unlike capabilities they
//! are never discovered semantically; the table only offers registration
//! with duplicate detection, exact lookup and listing.
//!
//! # Example
//!
//! ```rust,ignore
//! use cortex_core::tools::{ToolTable, ToolMetadata};
//!
//! let mut tools = ToolTable::new();
//! tools.register(ToolMetadata::new("search", "Search the codebase"), Arc::new(SearchHandler))?;
//!
//! let handler = tools.handler("search").unwrap();
//! ```

use super::handler::BoxedHandler;
use crate::capabilities::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Tool metadata shown to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique identifier)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// When should the model use this tool?
    pub usage_hints: Vec<String>,

    /// Tags for categorization
    pub tags: Vec<String>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            usage_hints: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Add a usage hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.usage_hints.push(hint.into());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Summary of a tool for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl From<&ToolMetadata> for ToolSummary {
    fn from(metadata: &ToolMetadata) -> Self {
        Self {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            tags: metadata.tags.clone(),
        }
    }
}

#[derive(Clone)]
struct ToolEntry {
    metadata: ToolMetadata,
    handler: BoxedHandler,
}

/// Name-keyed table of tool handlers
#[derive(Clone, Default)]
pub struct ToolTable {
    tools: HashMap<String, ToolEntry>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolTable")
            .field("tool_count", &self.tools.len())
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// Returns an error if a tool with the same name is already registered.
    pub fn register(
        &mut self,
        metadata: ToolMetadata,
        handler: BoxedHandler,
    ) -> Result<(), RegistryError> {
        let name = metadata.name.clone();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, ToolEntry { metadata, handler });
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool(
        mut self,
        metadata: ToolMetadata,
        handler: BoxedHandler,
    ) -> Result<Self, RegistryError> {
        self.register(metadata, handler)?;
        Ok(self)
    }

    /// Unregister a tool by name
    ///
    /// Returns the handler if found, None otherwise.
    pub fn unregister(&mut self, name: &str) -> Option<BoxedHandler> {
        let entry = self.tools.remove(name)?;
        self.order.retain(|n| n != name);
        Some(entry.handler)
    }

    /// Exact-name handler lookup
    pub fn handler(&self, name: &str) -> Option<BoxedHandler> {
        self.tools.get(name).map(|e| Arc::clone(&e.handler))
    }

    /// Metadata lookup
    pub fn metadata(&self, name: &str) -> Option<&ToolMetadata> {
        self.tools.get(name).map(|e| &e.metadata)
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all tools with their summaries, in registration order
    pub fn list(&self) -> Vec<ToolSummary> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|e| ToolSummary::from(&e.metadata))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnHandler, Handler};
    use serde_json::json;

    fn echo() -> BoxedHandler {
        Arc::new(FnHandler::new(|_, args| Ok(json!(args))))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table = ToolTable::new();
        table
            .register(
                ToolMetadata::new("search", "Search the codebase").with_tag("code"),
                echo(),
            )
            .unwrap();

        assert!(table.contains("search"));
        assert!(table.handler("search").is_some());
        assert!(table.handler("Search").is_none());
        assert_eq!(table.metadata("search").unwrap().tags, vec!["code"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut table = ToolTable::new();
        table
            .register(ToolMetadata::new("search", "first"), echo())
            .unwrap();

        let err = table
            .register(ToolMetadata::new("search", "second"), echo())
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "search"));
        assert_eq!(table.metadata("search").unwrap().description, "first");
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let table = ToolTable::new()
            .with_tool(ToolMetadata::new("b", "second letter"), echo())
            .unwrap()
            .with_tool(ToolMetadata::new("a", "first letter"), echo())
            .unwrap();

        assert_eq!(table.names(), vec!["b", "a"]);
        let listed: Vec<String> = table.list().into_iter().map(|s| s.name).collect();
        assert_eq!(listed, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unregister() {
        let mut table = ToolTable::new();
        table
            .register(ToolMetadata::new("echo", "Echoes arguments"), echo())
            .unwrap();

        let handler = table.unregister("echo").unwrap();
        assert!(!table.contains("echo"));
        assert!(table.names().is_empty());

        let out = handler
            .run("any", &json!({"k": 1}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(out, json!({"k": 1}));
    }
}
