//! ReAct loop controller
//!
//! This module provides [`ReActAgent`], which alternates between asking the
//! model for a reasoning turn and executing the action that turn contains:
//!
//! ```text
//! REASON -> PARSE -> ROUTE -> EXECUTE -> FEEDBACK -> REASON ...
//! ```
//!
//! A turn ends when the model answers without an action, an action cannot
//! be resolved or fails, an action produces no output, or the iteration
//! budget runs out. The loop never returns an error; every outcome is a
//! reply string.

use crate::capabilities::{CapabilityMatch, CapabilityRegistry, RegistryError};
use crate::config::{AgentConfig, CortexConfig};
use crate::embeddings::{EmbeddingProvider, EmbeddingProviderFactory};
use crate::error::{CortexError, Result};
use crate::events::{CortexEvent, EventSink, tracing_sink};
use crate::llm::{LLMProvider, LLMRequest, Message, MessageRole};
use crate::parsing::ActionParser;
use crate::prompts;
use crate::router::{DEFAULT_TOP_K, Router};
use crate::tools::{ActionStatus, BoundedExecutor, BoxedHandler, ToolMetadata, ToolTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model replied without an action
    Answered,
    /// An action named an unknown tool or capability
    NotFound,
    /// An action failed or timed out
    ActionFailed,
    /// An action succeeded with empty output
    EmptyResult,
    /// The iteration budget ran out
    Exhausted,
    /// The model collaborator returned an error
    ModelFailed,
}

/// Result of one `run` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutcome {
    /// Text returned to the caller
    pub reply: String,
    /// Status of the last step
    pub status: ActionStatus,
    /// Reasoning turns requested from the model
    pub iterations: usize,
    /// Actions that reached a handler or the capability index
    pub actions_executed: usize,
    pub stop_reason: StopReason,
}

/// Reasoning/acting agent over a tool table and a shared capability registry
pub struct ReActAgent {
    config: AgentConfig,
    llm: Arc<dyn LLMProvider>,
    parser: ActionParser,
    router: Router,
    system_prompt: String,
    conversation: Vec<Message>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ReActAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReActAgent")
            .field("name", &self.config.name)
            .field("max_iterations", &self.config.max_iterations)
            .field("messages", &self.conversation.len())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl ReActAgent {
    /// Create a new agent builder
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// System prompt sent ahead of the conversation
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Conversation so far, oldest first
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        self.router.registry()
    }

    pub fn tools(&self) -> &ToolTable {
        self.router.tools()
    }

    /// Answer `query`, running actions along the way
    pub async fn chat(&mut self, query: impl Into<String>) -> String {
        self.run(query).await.reply
    }

    /// Like [`chat`](Self::chat), with loop statistics
    pub async fn run(&mut self, query: impl Into<String>) -> ChatOutcome {
        let max_iterations = self.config.max_iterations;
        let mut input = Some(Message::user(query));
        let mut last_reasoning: Option<String> = None;
        let mut last_status = ActionStatus::NoAction;
        let mut actions_executed = 0;

        for iteration in 1..=max_iterations {
            if let Some(message) = input.take() {
                self.conversation.push(message);
            }

            let reasoning = match self.reason().await {
                Ok(reasoning) => reasoning,
                Err(err) => {
                    tracing::error!(agent = %self.config.name, iteration, error = %err, "Model call failed");
                    let reply = last_reasoning
                        .unwrap_or_else(|| format!("An error occurred: {}", err));
                    return ChatOutcome {
                        reply,
                        status: ActionStatus::Error,
                        iterations: iteration,
                        actions_executed,
                        stop_reason: StopReason::ModelFailed,
                    };
                }
            };

            self.conversation.push(Message::assistant(reasoning.clone()));
            self.sink.record(CortexEvent::ReasoningProduced {
                agent: self.config.name.clone(),
                iteration,
                content: reasoning.clone(),
            });

            let parsed = self.parser.inspect(&reasoning);
            last_reasoning = Some(reasoning.clone());

            let Some(request) = parsed.action else {
                if parsed.continuation {
                    self.sink.record(CortexEvent::ContinuationApproved {
                        agent: self.config.name.clone(),
                        iteration,
                    });
                    input = Some(Message::user(self.config.continuation_prompt.clone()));
                    continue;
                }

                self.sink.record(CortexEvent::NoActionDetected {
                    agent: self.config.name.clone(),
                    iteration,
                });
                return ChatOutcome {
                    reply: reasoning,
                    status: ActionStatus::NoAction,
                    iterations: iteration,
                    actions_executed,
                    stop_reason: StopReason::Answered,
                };
            };

            let result = self.router.route(&request).await;
            last_status = result.status;
            if result.status != ActionStatus::NotFound {
                actions_executed += 1;
            }

            match result.status {
                ActionStatus::Success => {
                    let text = result.payload_text();
                    if text.trim().is_empty() {
                        tracing::info!(agent = %self.config.name, iteration, "Action returned no result");
                        return ChatOutcome {
                            reply: format!("{} + No result from action.", reasoning),
                            status: result.status,
                            iterations: iteration,
                            actions_executed,
                            stop_reason: StopReason::EmptyResult,
                        };
                    }
                    // observations are recorded even when the budget runs out
                    self.conversation.push(Message::tool(text));
                }
                ActionStatus::Error if self.config.continue_on_error => {
                    tracing::warn!(
                        agent = %self.config.name,
                        iteration,
                        error = result.error_detail.as_deref().unwrap_or_default(),
                        "Action failed, feeding error back"
                    );
                    self.conversation.push(Message::tool(result.payload_text()));
                }
                status => {
                    tracing::error!(
                        agent = %self.config.name,
                        iteration,
                        status = %status,
                        payload = %result.payload_text(),
                        "Action did not complete"
                    );
                    let stop_reason = if status == ActionStatus::NotFound {
                        StopReason::NotFound
                    } else {
                        StopReason::ActionFailed
                    };
                    return ChatOutcome {
                        reply: reasoning,
                        status,
                        iterations: iteration,
                        actions_executed,
                        stop_reason,
                    };
                }
            }
        }

        self.sink.record(CortexEvent::IterationsExhausted {
            agent: self.config.name.clone(),
            max_iterations,
        });
        ChatOutcome {
            reply: last_reasoning.unwrap_or_default(),
            status: last_status,
            iterations: max_iterations,
            actions_executed,
            stop_reason: StopReason::Exhausted,
        }
    }

    /// Clear the conversation and the registry's discovery set
    pub async fn reset(&mut self) {
        self.conversation.clear();
        self.router.registry().reset_discovery().await;
        self.sink.record(CortexEvent::ConversationReset {
            agent: self.config.name.clone(),
        });
    }

    /// Search the registry on behalf of a caller
    pub async fn suggest_capabilities(
        &self,
        query: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<CapabilityMatch>, RegistryError> {
        self.router.registry().search(query, top_k).await
    }

    async fn reason(&self) -> Result<String> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(
            self.conversation
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .cloned(),
        );

        let response = self
            .llm
            .generate_request(&LLMRequest::from_messages(messages))
            .await?;
        Ok(response.content)
    }
}

/// Builder for [`ReActAgent`]
pub struct AgentBuilder {
    config: AgentConfig,
    top_k: usize,
    llm_provider: Option<Arc<dyn LLMProvider>>,
    registry: Option<Arc<CapabilityRegistry>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    tools: Vec<(ToolMetadata, BoxedHandler)>,
    sink: Option<Arc<dyn EventSink>>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self {
            config: AgentConfig::default(),
            top_k: DEFAULT_TOP_K,
            llm_provider: None,
            registry: None,
            embedding_provider: None,
            tools: Vec::new(),
            sink: None,
        }
    }

    /// Start from a loaded configuration
    ///
    /// Builds the embedding provider from `config.embeddings` unless one is
    /// set explicitly later.
    pub fn from_config(config: &CortexConfig) -> Result<Self> {
        let embeddings = EmbeddingProviderFactory::from_config(config.embeddings.as_ref())?;
        Ok(Self::new()
            .config(config.agent.clone())
            .top_k(config.registry.default_top_k)
            .embedding_provider(embeddings))
    }

    /// Set agent name (used in telemetry)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the loop configuration
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the reasoning budget per `chat` call
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the number of capabilities returned per discovery request
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set LLM provider
    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.llm_provider = Some(provider);
        self
    }

    /// Share an existing capability registry
    pub fn registry(mut self, registry: Arc<CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Embeddings for a fresh registry (ignored when a registry is set)
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Add a tool to this agent
    pub fn tool(mut self, metadata: ToolMetadata, handler: BoxedHandler) -> Self {
        self.tools.push((metadata, handler));
        self
    }

    /// Set the telemetry sink (defaults to `tracing`)
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the agent
    ///
    /// # Errors
    ///
    /// Fails without an LLM provider, on duplicate tool names, or on an
    /// invalid configuration.
    pub fn build(self) -> Result<ReActAgent> {
        let llm = self
            .llm_provider
            .ok_or_else(|| CortexError::Configuration("LLM provider is required".to_string()))?;

        if self.config.max_iterations == 0 {
            return Err(CortexError::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let sink = self.sink.unwrap_or_else(tracing_sink);

        let mut tools = ToolTable::new();
        for (metadata, handler) in self.tools {
            tools.register(metadata, handler)?;
        }

        let registry = match (self.registry, self.embedding_provider) {
            (Some(registry), _) => registry,
            (None, Some(embeddings)) => Arc::new(CapabilityRegistry::new(embeddings)),
            (None, None) => Arc::new(CapabilityRegistry::new(
                EmbeddingProviderFactory::from_config(None)?,
            )),
        };

        let system_prompt = prompts::system_prompt(self.config.base_prompt(), &tools.list());
        let executor = BoundedExecutor::new(self.config.executor_config(), Arc::clone(&sink));
        let router = Router::new(tools, registry, executor, Arc::clone(&sink)).with_top_k(self.top_k);

        tracing::info!(
            agent = %self.config.name,
            max_iterations = self.config.max_iterations,
            tools = router.tools().len(),
            "Agent ready"
        );

        Ok(ReActAgent {
            parser: ActionParser::new(Arc::clone(&sink)),
            config: self.config,
            llm,
            router,
            system_prompt,
            conversation: Vec::new(),
            sink,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
