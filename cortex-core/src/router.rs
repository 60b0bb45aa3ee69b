//! Request routing
//!
//! Resolves a parsed [`ActionRequest`] to a handler and runs it through the
//! [`BoundedExecutor`]. Tools are looked up in the agent's [`ToolTable`];
//! capabilities and discovery queries go to the shared
//! [`CapabilityRegistry`].

use crate::capabilities::CapabilityRegistry;
use crate::events::{CortexEvent, EventSink};
use crate::parsing::{ActionKind, ActionRequest};
use crate::tools::{Arguments, BoundedExecutor, BoxedHandler, ExecutionResult, ToolTable};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of capabilities returned for a discovery query
pub const DEFAULT_TOP_K: usize = 5;

/// Dispatches requests to tools, capabilities and capability search
pub struct Router {
    tools: ToolTable,
    registry: Arc<CapabilityRegistry>,
    executor: BoundedExecutor,
    top_k: usize,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("tools", &self.tools)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(
        tools: ToolTable,
        registry: Arc<CapabilityRegistry>,
        executor: BoundedExecutor,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            tools,
            registry,
            executor,
            top_k: DEFAULT_TOP_K,
            sink,
        }
    }

    /// Set how many capabilities a discovery query returns
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }

    /// Route a request and return its result; never fails
    pub async fn route(&self, request: &ActionRequest) -> ExecutionResult {
        match request {
            ActionRequest::CapabilityQuery { query_text } => self.discover(query_text).await,
            ActionRequest::Tool {
                name,
                action,
                arguments,
            } => {
                let handler = self.tools.handler(name);
                self.dispatch(ActionKind::Tool, handler, name, action, arguments)
                    .await
            }
            ActionRequest::Capability {
                name,
                action,
                arguments,
            } => {
                let handler = self.registry.handler(name).await;
                self.dispatch(ActionKind::Capability, handler, name, action, arguments)
                    .await
            }
        }
    }

    async fn dispatch(
        &self,
        kind: ActionKind,
        handler: Option<BoxedHandler>,
        name: &str,
        action: &str,
        arguments: &Arguments,
    ) -> ExecutionResult {
        let Some(handler) = handler else {
            tracing::warn!(kind = %kind, name = %name, "Unresolved action target");
            self.sink.record(CortexEvent::ActionNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            });
            return ExecutionResult::not_found(kind.as_str(), name);
        };

        self.sink.record(CortexEvent::ActionDispatched {
            kind: kind.to_string(),
            name: name.to_string(),
            action: action.to_string(),
        });
        self.executor
            .execute_named(name, handler.as_ref(), action, arguments)
            .await
    }

    async fn discover(&self, query: &str) -> ExecutionResult {
        let started = Instant::now();
        let matches = match self.registry.search(query, self.top_k).await {
            Ok(matches) => matches,
            Err(err) => {
                tracing::warn!(query = %query, error = %err, "Capability search failed");
                return ExecutionResult::error(err.to_string(), started.elapsed());
            }
        };

        self.sink.record(CortexEvent::CapabilitiesDiscovered {
            query: query.to_string(),
            names: matches.iter().map(|m| m.name.clone()).collect(),
        });

        match serde_json::to_string(&matches) {
            Ok(listing) => ExecutionResult::success(Value::String(listing), started.elapsed()),
            Err(err) => ExecutionResult::error(err.to_string(), started.elapsed()),
        }
    }

    /// Deadline that applies to `name`
    pub fn timeout_for(&self, name: &str) -> Duration {
        self.executor.timeout_for(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityDescriptor;
    use crate::embeddings::HashingEmbeddings;
    use crate::events::CapturingSink;
    use crate::tools::{
        ActionStatus, ExecutorConfig, FnHandler, HandlerError, ToolMetadata, required_str,
    };
    use serde_json::json;

    async fn router() -> (Router, Arc<CapturingSink>) {
        let sink = Arc::new(CapturingSink::new());

        let registry = Arc::new(CapabilityRegistry::new(Arc::new(HashingEmbeddings::default())));
        registry
            .register(
                CapabilityDescriptor::new(
                    "summarize",
                    "summarize a long block of text",
                    Arc::new(FnHandler::new(|_, args| {
                        Ok(json!(required_str(args, "text")?.to_uppercase()))
                    })),
                )
                .with_instruction("use capability:summarize|run|{\"text\": \"...\"}"),
            )
            .await
            .unwrap();
        registry
            .register(CapabilityDescriptor::new(
                "calculator",
                "add and multiply numbers",
                Arc::new(FnHandler::new(|_, _| Ok(json!(4)))),
            ))
            .await
            .unwrap();

        let mut tools = ToolTable::new();
        tools
            .register(
                ToolMetadata::new("fail", "Always fails"),
                Arc::new(FnHandler::new(|_, _| Err(HandlerError::failed("boom")))),
            )
            .unwrap();

        let executor = BoundedExecutor::new(ExecutorConfig::default(), sink.clone());
        let router = Router::new(tools, registry, executor, sink.clone()).with_top_k(1);
        (router, sink)
    }

    fn capability(name: &str, arguments: Value) -> ActionRequest {
        ActionRequest::Capability {
            name: name.to_string(),
            action: "run".to_string(),
            arguments: arguments.as_object().cloned().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_route_capability() {
        let (router, sink) = router().await;
        let result = router.route(&capability("summarize", json!({"text": "hi"}))).await;

        assert_eq!(result.status, ActionStatus::Success);
        assert_eq!(result.payload, json!("HI"));
        assert_eq!(sink.event_types(), vec!["action_dispatched", "action_completed"]);
    }

    #[tokio::test]
    async fn test_unknown_names_are_not_found() {
        let (router, sink) = router().await;

        let result = router.route(&capability("translate", json!({}))).await;
        assert_eq!(result.status, ActionStatus::NotFound);
        assert_eq!(result.payload, json!("Capability 'translate' not found."));

        // Capabilities are not reachable through the tool table
        let result = router
            .route(&ActionRequest::Tool {
                name: "summarize".to_string(),
                action: "run".to_string(),
                arguments: Arguments::new(),
            })
            .await;
        assert_eq!(result.status, ActionStatus::NotFound);
        assert_eq!(result.payload, json!("Tool 'summarize' not found."));
        assert_eq!(sink.count("action_not_found"), 2);
    }

    #[tokio::test]
    async fn test_tool_error_is_wrapped() {
        let (router, _) = router().await;
        let result = router
            .route(&ActionRequest::Tool {
                name: "fail".to_string(),
                action: "run".to_string(),
                arguments: Arguments::new(),
            })
            .await;

        assert_eq!(result.status, ActionStatus::Error);
        assert_eq!(result.payload, json!("An error occurred: boom"));
        assert_eq!(result.error_detail.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_capability_query_returns_listing() {
        let (router, sink) = router().await;
        let result = router
            .route(&ActionRequest::CapabilityQuery {
                query_text: "summarize some text".to_string(),
            })
            .await;

        assert_eq!(result.status, ActionStatus::Success);
        let listing: Vec<Value> =
            serde_json::from_str(result.payload.as_str().unwrap()).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0]["name"], json!("summarize"));
        assert!(listing[0].get("instruction").is_some());

        assert!(router.registry().is_discovered("summarize").await);
        assert_eq!(sink.count("capabilities_discovered"), 1);
        assert_eq!(sink.count("action_dispatched"), 0);
    }
}
