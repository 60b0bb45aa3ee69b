//! Execution results and the status taxonomy
//!
//! Every path below the loop controller resolves into an [`ExecutionResult`]:
//! - `NoAction` (200) when a reasoning turn carried no command
//! - `Success` (201) when a handler ran or discovery returned results
//! - `NotFound` (404) when the named tool or capability is unknown
//! - `Error` (500) for handler failures and timeouts

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Payload reported when a handler exceeds its deadline
pub const TIMEOUT_MESSAGE: &str = "The action timed out.";

/// Outcome status of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// No action detected
    NoAction,
    /// Action executed
    Success,
    /// Named tool or capability is not registered
    NotFound,
    /// Handler or timeout error
    Error,
}

impl ActionStatus {
    /// Numeric status code
    pub fn code(&self) -> u16 {
        match self {
            ActionStatus::NoAction => 200,
            ActionStatus::Success => 201,
            ActionStatus::NotFound => 404,
            ActionStatus::Error => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionStatus::Success)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Result of routing and executing one action request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ActionStatus,

    /// Handler output, discovery listing, or error text
    pub payload: Value,

    /// Wall-clock time spent in the handler
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ExecutionResult {
    /// Handler completed successfully
    pub fn success(payload: Value, duration: Duration) -> Self {
        Self {
            status: ActionStatus::Success,
            payload,
            duration,
            error_detail: None,
        }
    }

    /// Reasoning carried no action
    pub fn no_action(reasoning: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::NoAction,
            payload: Value::String(reasoning.into()),
            duration: Duration::ZERO,
            error_detail: None,
        }
    }

    /// Unknown tool or capability; `kind` is capitalised into the message
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self {
            status: ActionStatus::NotFound,
            payload: Value::String(format!("{} '{}' not found.", capitalize(kind), name)),
            duration: Duration::ZERO,
            error_detail: None,
        }
    }

    /// Handler failed; the payload wraps the original message
    pub fn error(message: impl Into<String>, duration: Duration) -> Self {
        let message = message.into();
        Self {
            status: ActionStatus::Error,
            payload: Value::String(format!("An error occurred: {}", message)),
            duration,
            error_detail: Some(message),
        }
    }

    /// Handler exceeded its deadline
    pub fn timed_out(timeout: Duration, duration: Duration) -> Self {
        Self {
            status: ActionStatus::Error,
            payload: Value::String(TIMEOUT_MESSAGE.to_string()),
            duration,
            error_detail: Some(format!("deadline of {:?} exceeded", timeout)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_timeout(&self) -> bool {
        self.status == ActionStatus::Error && self.payload.as_str() == Some(TIMEOUT_MESSAGE)
    }

    /// Payload as text fed back to the model: strings verbatim, other
    /// values as compact JSON, null as empty
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(ActionStatus::NoAction.code(), 200);
        assert_eq!(ActionStatus::Success.code(), 201);
        assert_eq!(ActionStatus::NotFound.code(), 404);
        assert_eq!(ActionStatus::Error.code(), 500);
        assert_eq!(ActionStatus::Success.to_string(), "201");
    }

    #[test]
    fn test_not_found_message() {
        let result = ExecutionResult::not_found("tool", "grep");
        assert_eq!(result.status, ActionStatus::NotFound);
        assert_eq!(result.payload_text(), "Tool 'grep' not found.");

        let result = ExecutionResult::not_found("capability", "summarize");
        assert_eq!(result.payload_text(), "Capability 'summarize' not found.");
    }

    #[test]
    fn test_error_wraps_message() {
        let result = ExecutionResult::error("boom", Duration::from_millis(3));
        assert_eq!(result.status, ActionStatus::Error);
        assert_eq!(result.payload_text(), "An error occurred: boom");
        assert_eq!(result.error_detail.as_deref(), Some("boom"));
        assert!(!result.is_timeout());
    }

    #[test]
    fn test_timed_out() {
        let result = ExecutionResult::timed_out(Duration::from_secs(1), Duration::from_secs(1));
        assert!(result.is_timeout());
        assert_eq!(result.payload_text(), TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_payload_text_variants() {
        let text = ExecutionResult::success(json!("HI"), Duration::ZERO);
        assert_eq!(text.payload_text(), "HI");

        let structured = ExecutionResult::success(json!({"lines": 3}), Duration::ZERO);
        assert_eq!(structured.payload_text(), r#"{"lines":3}"#);

        let empty = ExecutionResult::success(Value::Null, Duration::ZERO);
        assert_eq!(empty.payload_text(), "");
    }
}
