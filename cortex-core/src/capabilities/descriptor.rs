//! Capability descriptors and the views the registry hands out

use crate::error::{CortexError, Result};
use crate::tools::BoxedHandler;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// A registered capability: metadata plus the handler that runs it
#[derive(Clone)]
pub struct CapabilityDescriptor {
    /// Unique key
    pub name: String,

    /// Text the embedding is computed from
    pub description: String,

    /// Usage text shown to the model when the capability is advertised
    pub instruction: String,

    /// Free-form metadata, usable in filtered searches
    pub metadata: Map<String, Value>,

    pub handler: BoxedHandler,
}

impl std::fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("instruction", &self.instruction)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl CapabilityDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: BoxedHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instruction: String::new(),
            metadata: Map::new(),
            handler,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Serializable view without the handler
    pub fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: self.name.clone(),
            description: self.description.clone(),
            instruction: self.instruction.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Handler-less capability definition, as found in YAML/JSON manifests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl CapabilitySpec {
    /// Attach a handler to produce a registrable descriptor
    pub fn into_descriptor(self, handler: BoxedHandler) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.name,
            description: self.description,
            instruction: self.instruction,
            metadata: self.metadata,
            handler,
        }
    }
}

/// Parse a capability manifest: a YAML (or JSON) list of [`CapabilitySpec`]
pub fn parse_manifest(contents: &str) -> Result<Vec<CapabilitySpec>> {
    serde_yaml::from_str(contents)
        .map_err(|e| CortexError::Configuration(format!("Invalid capability manifest: {}", e)))
}

/// Read and parse a manifest file
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Vec<CapabilitySpec>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_manifest(&contents)
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySummary {
    pub name: String,
    pub description: String,
}

/// Search hit advertised to the model
///
/// `score` is kept for callers but left out of the serialized form the
/// model sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMatch {
    pub name: String,
    pub description: String,
    pub instruction: String,
    #[serde(skip_serializing, default)]
    pub score: f32,
}
