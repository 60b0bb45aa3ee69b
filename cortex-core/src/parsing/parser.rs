//! Parse error types and the parsed-reply bundle

use super::action::ActionRequest;
use thiserror::Error;

/// Error type for action parsing
///
/// Never escapes [`ActionParser::parse`](super::ActionParser::parse): a
/// malformed command downgrades to "no action".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The inline argument literal is not valid JSON
    #[error("Invalid arguments for {kind} '{name}': {reason}")]
    InvalidArguments {
        kind: &'static str,
        name: String,
        reason: String,
    },
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Everything the loop needs from one reasoning turn
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// The action to run, if any
    pub action: Option<ActionRequest>,
    /// Whether the model asked to keep going
    pub continuation: bool,
}

impl ParsedReply {
    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }
}
