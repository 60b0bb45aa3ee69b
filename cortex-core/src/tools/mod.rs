//! Handlers, the tool table, and bounded execution
//!
//! This module provides the execution layer the router delegates to.
//! Key features:
//! - One explicit [`Handler`] contract for tools and capabilities
//! - Exact-name tool table with duplicate detection
//! - Deadline enforcement through pluggable timeout strategies
//! - Structured results with a fixed status taxonomy
//!
//! # Example
//!
//! ```rust,no_run
//! use cortex_core::events::tracing_sink;
//! use cortex_core::tools::{Arguments, BoundedExecutor, ExecutorConfig, FnHandler};
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let executor = BoundedExecutor::new(ExecutorConfig::default(), tracing_sink());
//! let handler = FnHandler::new(|_, _| Ok(serde_json::json!("done")));
//!
//! let result = executor
//!     .execute("demo", &handler, "run", &Arguments::new(), Duration::from_secs(5))
//!     .await;
//! assert!(result.is_success());
//! # }
//! ```

mod handler;
mod result;
mod runtime;
mod table;

pub use handler::{
    required_str, Arguments, BoxedHandler, FnHandler, Handler, HandlerError, HandlerErrorKind,
};
pub use result::{ActionStatus, ExecutionResult, TIMEOUT_MESSAGE};
pub use runtime::{
    BoundedExecutor, BoundedOutcome, DeadlineStrategy, ExecutorConfig, TimeoutMode,
    TimeoutStrategy, WatchdogStrategy, timer_driver_available,
};
pub use table::{ToolMetadata, ToolSummary, ToolTable};
