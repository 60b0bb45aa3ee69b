//! Handler contract shared by tools and capabilities
//!
//! A handler is the only coupling point to concrete tool implementations.
//! The router never probes what a handler can do; it calls [`Handler::run`]
//! with the action verb and the decoded arguments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Decoded action arguments, in the order they appeared in the model output
pub type Arguments = Map<String, Value>;

/// Handler error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerErrorKind {
    /// The handler does not implement the requested action verb
    UnsupportedAction,

    /// Arguments are missing or have the wrong shape
    InvalidArguments,

    /// The handler ran and failed
    Failed,

    /// The handler panicked; the executor converted the panic
    Panicked,
}

/// Error returned by a handler invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: HandlerErrorKind,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: HandlerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The action verb is not one the handler knows
    pub fn unsupported_action(action: &str) -> Self {
        Self::new(
            HandlerErrorKind::UnsupportedAction,
            format!("Unsupported action: {}", action),
        )
    }

    /// A required argument is absent or malformed
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(HandlerErrorKind::InvalidArguments, message)
    }

    /// Generic failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(HandlerErrorKind::Failed, message)
    }

    pub(crate) fn panicked(message: impl Into<String>) -> Self {
        Self::new(HandlerErrorKind::Panicked, message)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::failed(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::invalid_arguments(err.to_string())
    }
}

/// Invocable operation behind a tool or capability
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run `action` with the decoded `arguments`
    async fn run(&self, action: &str, arguments: &Arguments) -> Result<Value, HandlerError>;
}

/// Shared handler reference
pub type BoxedHandler = Arc<dyn Handler>;

/// Adapter turning a synchronous closure into a [`Handler`]
///
/// Useful for small capabilities and in tests:
///
/// ```rust,ignore
/// let upper = FnHandler::new(|_action, args| {
///     let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
///     Ok(serde_json::json!(text.to_uppercase()))
/// });
/// ```
pub struct FnHandler<F>
where
    F: Fn(&str, &Arguments) -> Result<Value, HandlerError> + Send + Sync,
{
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&str, &Arguments) -> Result<Value, HandlerError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&str, &Arguments) -> Result<Value, HandlerError> + Send + Sync,
{
    async fn run(&self, action: &str, arguments: &Arguments) -> Result<Value, HandlerError> {
        (self.func)(action, arguments)
    }
}

/// Read a required string argument
pub fn required_str<'a>(arguments: &'a Arguments, key: &str) -> Result<&'a str, HandlerError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::invalid_arguments(format!("missing string argument '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_fn_handler_runs_closure() {
        let handler = FnHandler::new(|action, args| {
            let text = required_str(args, "text")?;
            match action {
                "upper" => Ok(json!(text.to_uppercase())),
                other => Err(HandlerError::unsupported_action(other)),
            }
        });

        let ok = handler.run("upper", &args(json!({"text": "hi"}))).await;
        assert_eq!(ok.unwrap(), json!("HI"));

        let err = handler
            .run("lower", &args(json!({"text": "hi"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::UnsupportedAction);
        assert_eq!(err.to_string(), "Unsupported action: lower");
    }

    #[test]
    fn test_required_str_missing() {
        let err = required_str(&Arguments::new(), "path").unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::InvalidArguments);
        assert!(err.message.contains("path"));
    }

    #[test]
    fn test_error_conversions() {
        let err: HandlerError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.kind, HandlerErrorKind::Failed);
        assert_eq!(err.message, "disk full");
    }
}
