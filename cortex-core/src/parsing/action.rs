//! Action command parser
//!
//! Recognizes three command forms inside free model text, tested in this
//! priority order:
//!
//! ```text
//! use tool:<name>|<action>|<json-object>
//! use capability:<name>|<action>|<json-object>
//! request:capabilities|<free text query>
//! ```
//!
//! Keywords are case-insensitive. A trailing `[CAN I CONTINUE?]` marker asks
//! the loop for another turn and is detected independently.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};

use super::parser::{ParseError, ParseResult, ParsedReply};
use crate::events::{CortexEvent, EventSink};
use crate::tools::Arguments;

static TOOL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)use tool:([a-zA-Z0-9_]+)\|([a-zA-Z0-9_]+)\|(\{[^}]*\})")
        .expect("Invalid regex")
});

static CAPABILITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)use capability:([a-zA-Z0-9_]+)\|([a-zA-Z0-9_]+)\|(\{[^}]*\})")
        .expect("Invalid regex")
});

static CAPABILITY_QUERY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)request:capabilities\|(.*)").expect("Invalid regex"));

static CONTINUATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[CAN I CONTINUE\?\]").expect("Invalid regex"));

/// Which kind of request was parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tool,
    Capability,
    CapabilityQuery,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Tool => "tool",
            ActionKind::Capability => "capability",
            ActionKind::CapabilityQuery => "capability_query",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured request extracted from model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionRequest {
    Tool {
        name: String,
        action: String,
        arguments: Arguments,
    },
    Capability {
        name: String,
        action: String,
        arguments: Arguments,
    },
    CapabilityQuery {
        query_text: String,
    },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Tool { .. } => ActionKind::Tool,
            ActionRequest::Capability { .. } => ActionKind::Capability,
            ActionRequest::CapabilityQuery { .. } => ActionKind::CapabilityQuery,
        }
    }

    /// Target name; `None` for a discovery query
    pub fn name(&self) -> Option<&str> {
        match self {
            ActionRequest::Tool { name, .. } | ActionRequest::Capability { name, .. } => {
                Some(name)
            }
            ActionRequest::CapabilityQuery { .. } => None,
        }
    }
}

/// Extracts at most one [`ActionRequest`] from a reasoning turn
#[derive(Clone)]
pub struct ActionParser {
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ActionParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionParser").finish_non_exhaustive()
    }
}

impl ActionParser {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Parse the highest-priority command in `text`
    ///
    /// Undecodable arguments are reported as a `ParseFailed` event and
    /// treated as no action.
    pub fn parse(&self, text: &str) -> Option<ActionRequest> {
        match self.try_parse(text) {
            Ok(request) => request,
            Err(err) => {
                self.sink.record(CortexEvent::ParseFailed {
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Parse, surfacing argument decode failures
    pub fn try_parse(&self, text: &str) -> ParseResult<Option<ActionRequest>> {
        if let Some(caps) = TOOL_PATTERN.captures(text) {
            let name = caps[1].to_string();
            let arguments = decode_arguments("tool", &name, &caps[3])?;
            return Ok(Some(ActionRequest::Tool {
                name,
                action: caps[2].to_string(),
                arguments,
            }));
        }

        if let Some(caps) = CAPABILITY_PATTERN.captures(text) {
            let name = caps[1].to_string();
            let arguments = decode_arguments("capability", &name, &caps[3])?;
            return Ok(Some(ActionRequest::Capability {
                name,
                action: caps[2].to_string(),
                arguments,
            }));
        }

        if let Some(caps) = CAPABILITY_QUERY_PATTERN.captures(text) {
            return Ok(Some(ActionRequest::CapabilityQuery {
                query_text: caps[1].trim().to_string(),
            }));
        }

        Ok(None)
    }

    /// Whether the text carries the continuation marker
    pub fn wants_continuation(&self, text: &str) -> bool {
        CONTINUATION_PATTERN.is_match(text)
    }

    /// Action and continuation marker together
    pub fn inspect(&self, text: &str) -> ParsedReply {
        ParsedReply {
            action: self.parse(text),
            continuation: self.wants_continuation(text),
        }
    }
}

fn decode_arguments(kind: &'static str, name: &str, literal: &str) -> ParseResult<Arguments> {
    serde_json::from_str::<Map<String, Value>>(&escape_line_breaks(literal)).map_err(|e| {
        ParseError::InvalidArguments {
            kind,
            name: name.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Escape raw line breaks inside JSON string literals so argument text
/// spanning several lines decodes. Line breaks between tokens are valid JSON
/// whitespace and stay as they are.
fn escape_line_breaks(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    let mut in_string = false;
    let mut after_backslash = false;
    for c in literal.chars() {
        if in_string && !after_backslash {
            match c {
                '\n' => {
                    escaped.push_str("\\n");
                    continue;
                }
                '\r' => {
                    escaped.push_str("\\r");
                    continue;
                }
                _ => {}
            }
        }

        if after_backslash {
            after_backslash = false;
        } else if c == '\\' {
            after_backslash = in_string;
        } else if c == '"' {
            in_string = !in_string;
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CapturingSink;
    use serde_json::json;

    fn parser() -> (ActionParser, Arc<CapturingSink>) {
        let sink = Arc::new(CapturingSink::new());
        (ActionParser::new(sink.clone()), sink)
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_tool_command() {
        let (parser, _) = parser();
        let request = parser
            .parse(r#"I will look it up. use tool:search|lookup|{"q":"a"}"#)
            .unwrap();

        assert_eq!(request.kind(), ActionKind::Tool);
        assert_eq!(
            request,
            ActionRequest::Tool {
                name: "search".to_string(),
                action: "lookup".to_string(),
                arguments: args(json!({"q": "a"})),
            }
        );
    }

    #[test]
    fn test_parse_capability_command_case_insensitive() {
        let (parser, _) = parser();
        let request = parser
            .parse(r#"USE Capability:summarize|run|{"text": "hi"}"#)
            .unwrap();
        assert_eq!(request.kind(), ActionKind::Capability);
        assert_eq!(request.name(), Some("summarize"));
    }

    #[test]
    fn test_parse_capability_query() {
        let (parser, _) = parser();
        let request = parser
            .parse("Let me look.\nrequest:capabilities|  math helpers  \nthanks")
            .unwrap();
        assert_eq!(
            request,
            ActionRequest::CapabilityQuery {
                query_text: "math helpers".to_string()
            }
        );
        assert_eq!(request.name(), None);
    }

    #[test]
    fn test_tool_wins_over_earlier_capability() {
        let (parser, _) = parser();
        let text = r#"use capability:a|run|{} then use tool:b|go|{}"#;
        let request = parser.parse(text).unwrap();
        assert_eq!(request.kind(), ActionKind::Tool);
        assert_eq!(request.name(), Some("b"));
    }

    #[test]
    fn test_capability_wins_over_query() {
        let (parser, _) = parser();
        let text = "request:capabilities|anything\nuse capability:c|run|{}";
        assert_eq!(parser.parse(text).unwrap().kind(), ActionKind::Capability);
    }

    #[test]
    fn test_invalid_json_is_no_action() {
        let (parser, sink) = parser();
        assert!(parser.parse("use tool:x|y|{bad json").is_none());
        assert!(parser.parse("use tool:x|y|{bad json}").is_none());

        // The unterminated literal never matches, so only the second one fails to decode
        assert_eq!(sink.event_types(), vec!["parse_failed"]);
    }

    #[test]
    fn test_try_parse_reports_error() {
        let (parser, _) = parser();
        let err = parser.try_parse("use capability:c|run|{oops}").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidArguments { kind: "capability", ref name, .. } if name == "c"
        ));
    }

    #[test]
    fn test_multiline_arguments_decode() {
        let (parser, _) = parser();
        let text = "use capability:summarize|run|{\"text\": \"line one\nline two\"}";
        match parser.parse(text).unwrap() {
            ActionRequest::Capability { arguments, .. } => {
                assert_eq!(arguments["text"], json!("line one\nline two"));
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_argument_order_preserved() {
        let (parser, _) = parser();
        let request = parser
            .parse(r#"use tool:t|a|{"z": 1, "a": 2, "m": 3}"#)
            .unwrap();
        if let ActionRequest::Tool { arguments, .. } = request {
            let keys: Vec<&String> = arguments.keys().collect();
            assert_eq!(keys, vec!["z", "a", "m"]);
        } else {
            panic!("expected tool request");
        }
    }

    #[test]
    fn test_plain_text_has_no_action() {
        let (parser, sink) = parser();
        assert!(parser.parse("The answer is 42.").is_none());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_continuation_marker() {
        let (parser, _) = parser();
        assert!(parser.wants_continuation("Working on it. [CAN I CONTINUE?]"));
        assert!(parser.wants_continuation("[can i continue?]"));
        assert!(!parser.wants_continuation("Can I continue"));

        let reply = parser.inspect(r#"use tool:t|a|{} [CAN I CONTINUE?]"#);
        assert!(reply.has_action());
        assert!(reply.continuation);
    }

    #[test]
    fn test_pretty_printed_arguments_decode() {
        let (parser, sink) = parser();
        for text in [
            "use tool:search|lookup|{\n  \"q\": \"a\"\n}",
            "use tool:search|lookup|{\r\n  \"q\": \"a\",\r\n  \"limit\": 2\r\n}",
        ] {
            match parser.parse(text) {
                Some(ActionRequest::Tool { name, arguments, .. }) => {
                    assert_eq!(name, "search");
                    assert_eq!(arguments["q"], json!("a"));
                }
                other => panic!("unexpected request for {:?}: {:?}", text, other),
            }
        }
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_crlf_inside_string_decodes() {
        let (parser, _) = parser();
        let text = "use tool:note|write|{\n  \"body\": \"one\r\ntwo\"\n}";
        match parser.parse(text).unwrap() {
            ActionRequest::Tool { arguments, .. } => {
                assert_eq!(arguments["body"], json!("one\r\ntwo"));
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_escape_line_breaks() {
        assert_eq!(escape_line_breaks("{\"t\": \"a\nb\"}"), "{\"t\": \"a\\nb\"}");
        assert_eq!(escape_line_breaks("{\n\"t\": 1\n}"), "{\n\"t\": 1\n}");
        // an escaped quote does not end the string
        assert_eq!(
            escape_line_breaks("{\"t\": \"say \\\"hi\\\"\nnow\"}"),
            "{\"t\": \"say \\\"hi\\\"\\nnow\"}"
        );
    }
}
