//! Telemetry events and sinks
//!
//! Every component receives an [`EventSink`] at construction instead of
//! reaching for a process-wide logger. The default [`TracingSink`] forwards
//! events to `tracing`; tests inject a [`CapturingSink`] and assert on what
//! was recorded.
//!
//! # Example
//!
//! ```rust,ignore
//! use cortex_core::events::{CapturingSink, EventSink};
//!
//! let sink = Arc::new(CapturingSink::new());
//! let parser = ActionParser::new(sink.clone());
//! parser.parse("use tool:x|y|{bad json");
//! assert_eq!(sink.event_types(), vec!["parse_failed"]);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Severity attached to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Something that happened inside the parse/route/execute loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CortexEvent {
    /// The model produced a reasoning turn
    ReasoningProduced {
        agent: String,
        iteration: usize,
        content: String,
    },

    /// An action-shaped command could not be decoded
    ParseFailed { reason: String },

    /// The model asked to keep working past the current reply
    ContinuationApproved { agent: String, iteration: usize },

    /// A reasoning turn contained no action
    NoActionDetected { agent: String, iteration: usize },

    /// A request was handed to a handler
    ActionDispatched {
        kind: String,
        name: String,
        action: String,
    },

    /// A handler finished successfully
    ActionCompleted {
        name: String,
        action: String,
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },

    /// A handler exceeded its deadline
    ActionTimedOut {
        name: String,
        action: String,
        #[serde(with = "humantime_serde")]
        timeout: Duration,
    },

    /// A handler returned an error
    ActionFailed {
        name: String,
        action: String,
        error: String,
    },

    /// No handler is registered under the requested name
    ActionNotFound { kind: String, name: String },

    /// Capability discovery surfaced these names
    CapabilitiesDiscovered { query: String, names: Vec<String> },

    /// The iteration budget ran out before a terminal state
    IterationsExhausted { agent: String, max_iterations: usize },

    /// Conversation state was explicitly cleared
    ConversationReset { agent: String },
}

impl CortexEvent {
    /// Stable identifier for the event variant
    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::ReasoningProduced { .. } => "reasoning_produced",
            CortexEvent::ParseFailed { .. } => "parse_failed",
            CortexEvent::ContinuationApproved { .. } => "continuation_approved",
            CortexEvent::NoActionDetected { .. } => "no_action_detected",
            CortexEvent::ActionDispatched { .. } => "action_dispatched",
            CortexEvent::ActionCompleted { .. } => "action_completed",
            CortexEvent::ActionTimedOut { .. } => "action_timed_out",
            CortexEvent::ActionFailed { .. } => "action_failed",
            CortexEvent::ActionNotFound { .. } => "action_not_found",
            CortexEvent::CapabilitiesDiscovered { .. } => "capabilities_discovered",
            CortexEvent::IterationsExhausted { .. } => "iterations_exhausted",
            CortexEvent::ConversationReset { .. } => "conversation_reset",
        }
    }

    /// Severity used when the event is logged
    pub fn level(&self) -> EventLevel {
        match self {
            CortexEvent::ReasoningProduced { .. } => EventLevel::Debug,
            CortexEvent::ParseFailed { .. } => EventLevel::Warn,
            CortexEvent::ActionTimedOut { .. }
            | CortexEvent::ActionFailed { .. }
            | CortexEvent::ActionNotFound { .. } => EventLevel::Error,
            _ => EventLevel::Info,
        }
    }
}

/// Receiver of telemetry events
pub trait EventSink: Send + Sync {
    /// Record one event. Must not panic or block for long.
    fn record(&self, event: CortexEvent);
}

/// Sink that writes every event through `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: CortexEvent) {
        let event_type = event.event_type();
        let detail = serde_json::to_string(&event).unwrap_or_default();
        match event.level() {
            EventLevel::Debug => tracing::debug!(event_type, %detail, "cortex event"),
            EventLevel::Info => tracing::info!(event_type, %detail, "cortex event"),
            EventLevel::Warn => tracing::warn!(event_type, %detail, "cortex event"),
            EventLevel::Error => tracing::error!(event_type, %detail, "cortex event"),
        }
    }
}

/// Event with the wall-clock time it was recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub at: DateTime<Utc>,
    pub event: CortexEvent,
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct CapturingSink {
    events: Mutex<Vec<TimestampedEvent>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured events, oldest first
    pub fn events(&self) -> Vec<CortexEvent> {
        self.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Captured events with their timestamps
    pub fn timestamped(&self) -> Vec<TimestampedEvent> {
        self.lock().clone()
    }

    /// Event type names in recording order
    pub fn event_types(&self) -> Vec<&'static str> {
        self.lock().iter().map(|e| e.event.event_type()).collect()
    }

    /// Count events of one type
    pub fn count(&self, event_type: &str) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.event.event_type() == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TimestampedEvent>> {
        // a panicking recorder cannot leave the vector half-written
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for CapturingSink {
    fn record(&self, event: CortexEvent) {
        self.lock().push(TimestampedEvent {
            at: Utc::now(),
            event,
        });
    }
}

/// Sink that forwards each event to several sinks in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a downstream sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: CortexEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

/// Shared default sink
pub fn tracing_sink() -> Arc<dyn EventSink> {
    Arc::new(TracingSink)
}
