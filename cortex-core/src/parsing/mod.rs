//! Action parsing
//!
//! Turns a free-text reasoning turn into at most one structured
//! [`ActionRequest`], plus a continuation flag.
//!
//! # Example
//!
//! ```rust
//! use cortex_core::events::tracing_sink;
//! use cortex_core::parsing::{ActionKind, ActionParser};
//!
//! let parser = ActionParser::new(tracing_sink());
//! let request = parser
//!     .parse(r#"use tool:search|lookup|{"q": "a"}"#)
//!     .unwrap();
//! assert_eq!(request.kind(), ActionKind::Tool);
//! ```

mod action;
mod parser;

pub use action::{ActionKind, ActionParser, ActionRequest};
pub use parser::{ParseError, ParseResult, ParsedReply};
