//! Capabilities: handlers discoverable by meaning rather than by name
//!
//! A capability pairs a [`Handler`](crate::tools::Handler) with a description
//! that is embedded at registration. The model asks for capabilities with
//! `request:capabilities|<query>` and gets the closest matches back.

mod descriptor;
mod registry;
mod store;

pub use descriptor::{
    load_manifest, parse_manifest, CapabilityDescriptor, CapabilityMatch, CapabilitySpec,
    CapabilitySummary,
};
pub use registry::{CapabilityRegistry, RegistryError};
pub use store::{
    cosine_similarity, CapabilityStore, InMemoryStore, StoreError, StoreFilter, StoreMatch,
};
