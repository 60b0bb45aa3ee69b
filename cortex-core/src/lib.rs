//! # Cortex - bounded reasoning and acting for model-driven agents
//!
//! Cortex lets a language-model agent alternate between free-text reasoning
//! and invoking named operations, with:
//! - A small action grammar parsed out of model output
//! - Tools addressed by exact name and capabilities discovered by meaning
//! - Handler execution under a wall-clock deadline
//! - A bounded number of reasoning/acting iterations per query
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cortex_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(llm: Arc<dyn LLMProvider>) -> Result<()> {
//! let registry = Arc::new(CapabilityRegistry::new(Arc::new(HashingEmbeddings::default())));
//! registry
//!     .register(
//!         CapabilityDescriptor::new(
//!             "summarize",
//!             "Summarize a block of text",
//!             Arc::new(FnHandler::new(|_, args| {
//!                 Ok(serde_json::json!(required_str(args, "text")?.to_uppercase()))
//!             })),
//!         )
//!         .with_instruction(r#"use capability:summarize|run|{"text": "..."}"#),
//!     )
//!     .await?;
//!
//! let mut agent = ReActAgent::builder()
//!     .name("assistant")
//!     .llm_provider(llm)
//!     .registry(registry)
//!     .build()?;
//!
//! let reply = agent.chat("Summarize: the quick brown fox").await;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **parsing**: extracts at most one action request per reasoning turn
//! - **capabilities**: registry with embedding search over a pluggable store
//! - **router**: resolves a request to a tool, a capability, or a search
//! - **tools**: handler contract, tool table and the bounded executor
//! - **agent**: the loop controller that ties them together
//!
//! ## Feature Flags
//!
//! - `embeddings-local`: fastembed-backed [`embeddings::providers::LocalEmbeddings`]

pub mod agent;
pub mod capabilities;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod events;
pub mod llm;
pub mod parsing;
pub mod prompts;
pub mod router;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{AgentBuilder, ChatOutcome, ReActAgent, StopReason};
    pub use crate::capabilities::{
        CapabilityDescriptor, CapabilityMatch, CapabilityRegistry, CapabilitySpec,
        CapabilityStore, CapabilitySummary, InMemoryStore, RegistryError, StoreFilter,
    };
    pub use crate::config::{
        AgentConfig, CortexConfig, EmbeddingProviderKind, EmbeddingsConfig, RegistryConfig,
    };
    pub use crate::embeddings::{EmbeddingProvider, EmbeddingProviderFactory, HashingEmbeddings};
    pub use crate::error::{CortexError, Result};
    pub use crate::events::{
        CapturingSink, CortexEvent, EventSink, FanoutSink, TracingSink, tracing_sink,
    };
    pub use crate::llm::{LLMProvider, LLMRequest, LLMResponse, Message, MessageRole};
    pub use crate::parsing::{ActionKind, ActionParser, ActionRequest, ParsedReply};
    pub use crate::router::Router;
    pub use crate::tools::{
        ActionStatus, Arguments, BoundedExecutor, BoxedHandler, ExecutionResult, ExecutorConfig,
        FnHandler, Handler, HandlerError, TimeoutMode, ToolMetadata, ToolTable, required_str,
    };
}
