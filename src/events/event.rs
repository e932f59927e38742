//! # Audit events emitted during a run.
//!
//! [`Event`] is the unit of the audit trail: immutable once built, tagged
//! with the owning `execution_id`, classified by a closed [`EventType`]
//! enum (semantic names, not generic log levels), and carrying a
//! structured, type-specific payload.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) assigned at
//! construction, monotonically increasing across all executions. Sinks use
//! `seq` to verify per-execution ordering.
//!
//! ## Example
//! ```rust
//! use agentvisor::events::{Event, EventSource, EventType};
//!
//! let ev = Event::new("exec-1", EventType::NodeExecutionCompleted, EventSource::Node)
//!     .with_node("planner")
//!     .with_payload(serde_json::json!({"steps": 3}));
//!
//! assert_eq!(ev.event_type, EventType::NodeExecutionCompleted);
//! assert_eq!(ev.node_name.as_deref(), Some("planner"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Semantic classification of audit events.
///
/// Serialized to the stable dotted names (`execution.started`, ...) used
/// by downstream analysis and replay tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    // === Execution lifecycle ===
    /// A run began.
    #[serde(rename = "execution.started")]
    ExecutionStarted,
    /// A run reached a graph-terminal state (accepted or retry-exhausted).
    #[serde(rename = "execution.completed")]
    ExecutionCompleted,
    /// The governor cut a run short (budget, fault, dropped consumer).
    #[serde(rename = "execution.terminated")]
    ExecutionTerminated,

    // === Graph driving ===
    /// A planner pass began (first entry and each retry re-entry).
    #[serde(rename = "graph.loop_started")]
    GraphLoopStarted,
    /// The critic decided the fate of a pass.
    #[serde(rename = "graph.loop_completed")]
    GraphLoopCompleted,
    /// A conditional edge was taken.
    #[serde(rename = "graph.route_decision")]
    GraphRouteDecision,

    // === Node execution ===
    /// A stage started.
    #[serde(rename = "node.execution_started")]
    NodeExecutionStarted,
    /// A stage completed and its update was applied.
    #[serde(rename = "node.execution_completed")]
    NodeExecutionCompleted,
    /// A stage returned a fault (absorbed) or panicked (fatal).
    #[serde(rename = "node.execution_failed")]
    NodeExecutionFailed,

    // === Tool invocation ===
    /// A registry invocation began.
    #[serde(rename = "tool.call_started")]
    ToolCallStarted,
    /// A registry invocation succeeded.
    #[serde(rename = "tool.call_completed")]
    ToolCallCompleted,
    /// A registry invocation failed validation or execution.
    #[serde(rename = "tool.call_failed")]
    ToolCallFailed,

    // === State changes ===
    /// Full state snapshot.
    #[serde(rename = "state.snapshot")]
    StateSnapshot,
    /// Per-stage partial update.
    #[serde(rename = "state.delta")]
    StateDelta,

    // === Faults ===
    /// An infrastructure fault escaped a stage or the governor.
    #[serde(rename = "exception.raised")]
    ExceptionRaised,
    /// A fault was absorbed and the run continued.
    #[serde(rename = "exception.handled")]
    ExceptionHandled,

    // === Budget terminations ===
    /// Wall-clock budget exceeded.
    #[serde(rename = "termination.timeout")]
    TerminationTimeout,
    /// Stage-transition budget exceeded.
    #[serde(rename = "termination.max_steps")]
    TerminationMaxSteps,
    /// Retry budget exhausted.
    #[serde(rename = "termination.max_retries")]
    TerminationMaxRetries,
    /// Tool-call budget exceeded.
    #[serde(rename = "termination.max_tool_calls")]
    TerminationMaxToolCalls,
}

impl EventType {
    /// Returns the stable dotted name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ExecutionStarted => "execution.started",
            EventType::ExecutionCompleted => "execution.completed",
            EventType::ExecutionTerminated => "execution.terminated",
            EventType::GraphLoopStarted => "graph.loop_started",
            EventType::GraphLoopCompleted => "graph.loop_completed",
            EventType::GraphRouteDecision => "graph.route_decision",
            EventType::NodeExecutionStarted => "node.execution_started",
            EventType::NodeExecutionCompleted => "node.execution_completed",
            EventType::NodeExecutionFailed => "node.execution_failed",
            EventType::ToolCallStarted => "tool.call_started",
            EventType::ToolCallCompleted => "tool.call_completed",
            EventType::ToolCallFailed => "tool.call_failed",
            EventType::StateSnapshot => "state.snapshot",
            EventType::StateDelta => "state.delta",
            EventType::ExceptionRaised => "exception.raised",
            EventType::ExceptionHandled => "exception.handled",
            EventType::TerminationTimeout => "termination.timeout",
            EventType::TerminationMaxSteps => "termination.max_steps",
            EventType::TerminationMaxRetries => "termination.max_retries",
            EventType::TerminationMaxToolCalls => "termination.max_tool_calls",
        }
    }
}

/// Component that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// The execution governor.
    Executor,
    /// The stage graph's routing layer.
    Graph,
    /// A stage.
    Node,
    /// The tool registry.
    Tool,
    /// The pipeline's own degradation reporting.
    LoggingService,
}

impl EventSource {
    /// Returns the stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::Executor => "executor",
            EventSource::Graph => "graph",
            EventSource::Node => "node",
            EventSource::Tool => "tool",
            EventSource::LoggingService => "logging_service",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured fault details attached to failure events.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Stable fault classification.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Optional backtrace or panic rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Optional extra context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ErrorInfo {
    /// Creates fault details from a kind label and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: None,
            context: None,
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// The run this event belongs to.
    pub execution_id: String,
    /// Semantic classification.
    pub event_type: EventType,
    /// Wall-clock timestamp.
    pub timestamp: DateTime<Utc>,
    /// Producing component.
    pub source: EventSource,
    /// Type-specific structured payload.
    pub payload: Value,
    /// External request correlation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// User correlation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Stage name for node events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Tool name for tool events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Fault details for failure events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
}

impl Event {
    /// Creates a new event with the current timestamp and next sequence
    /// number. Optional fields are attached with the `with_*` builders.
    pub fn new(
        execution_id: impl Into<String>,
        event_type: EventType,
        source: EventSource,
    ) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            execution_id: execution_id.into(),
            event_type,
            timestamp: Utc::now(),
            source,
            payload: Value::Null,
            request_id: None,
            user_id: None,
            node_name: None,
            tool_name: None,
            error_info: None,
        }
    }

    /// Attaches a structured payload.
    #[inline]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches the external request id.
    #[inline]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attaches the user id.
    #[inline]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attaches a stage name.
    #[inline]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    /// Attaches a tool name.
    #[inline]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    /// Attaches fault details.
    #[inline]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new("e", EventType::ExecutionStarted, EventSource::Executor);
        let b = Event::new("e", EventType::ExecutionCompleted, EventSource::Executor);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn serializes_to_dotted_names() {
        let ev = Event::new("e", EventType::ToolCallFailed, EventSource::Tool)
            .with_tool("get_weather")
            .with_error_info(ErrorInfo::new("tool_validation_failed", "city is required"));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event_type"], "tool.call_failed");
        assert_eq!(json["source"], "tool");
        assert_eq!(json["tool_name"], "get_weather");
        assert_eq!(json["error_info"]["kind"], "tool_validation_failed");
        // Unset correlation fields are omitted entirely.
        assert!(json.get("request_id").is_none());
    }

    #[test]
    fn as_str_matches_serde_rename() {
        for ty in [
            EventType::ExecutionStarted,
            EventType::GraphRouteDecision,
            EventType::TerminationMaxToolCalls,
        ] {
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json, ty.as_str());
        }
    }
}
