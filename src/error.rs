//! Error types used by the execution runtime, stages, and tools.
//!
//! This module defines three error families:
//!
//! - [`GovernorError`] — infrastructure faults raised by the execution
//!   runtime itself (a panicking stage, a failed runtime construction).
//! - [`StageFault`] — a recoverable diagnostic returned by a stage; it is
//!   absorbed into the workflow state and never aborts a run.
//! - [`ToolError`] — typed failures of tool invocations performed through
//!   the registry.
//!
//! All types provide `as_label` / `as_message` helpers for logs and
//! report fields.

use thiserror::Error;

/// # Infrastructure faults of the execution runtime.
///
/// These are the only faults that terminate a run abnormally. Business
/// failures (empty drafts, failed tool calls, rejected drafts) are carried
/// in the workflow state instead and resolved by the critic loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GovernorError {
    /// A stage panicked. Panics are not part of the stage contract
    /// ([`StageFault`] is); they are treated as unrecoverable.
    #[error("stage '{node}' panicked: {message}")]
    StagePanic {
        /// Name of the node whose stage panicked.
        node: String,
        /// Panic payload rendered as text.
        message: String,
    },

    /// The blocking entry point could not construct its private runtime.
    #[error("runtime construction failed: {message}")]
    Runtime {
        /// The underlying I/O error message.
        message: String,
    },
}

impl GovernorError {
    /// Returns a short stable label (snake_case) for logs and the
    /// `error_type` report field.
    pub fn as_label(&self) -> &'static str {
        match self {
            GovernorError::StagePanic { .. } => "stage_panic",
            GovernorError::Runtime { .. } => "runtime_error",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Recoverable stage diagnostic.
///
/// A stage that cannot produce its output returns `Err(StageFault)` instead
/// of raising: the graph records the diagnostic into `memory` under
/// `{node}_error`, clears the stage's output fields, and proceeds. The
/// critic's emptiness/failure checks then route the pass to retry or
/// terminal failure.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct StageFault {
    /// Short classification, e.g. `"no_intent"` or `"retrieval_failed"`.
    pub kind: &'static str,
    /// Human-readable diagnostic recorded into the state.
    pub message: String,
}

impl StageFault {
    /// Creates a fault with the generic `"stage_fault"` kind.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "stage_fault",
            message: message.into(),
        }
    }

    /// Creates a fault with an explicit kind label.
    pub fn with_kind(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// # Errors produced by tool invocation through the registry.
///
/// Every variant is also recorded as a failed [`Observation`] on the state;
/// none of them aborts a run — the critic inspects `tool_calls` and decides.
///
/// [`Observation`]: crate::state::Observation
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ToolError {
    /// The requested tool name is not registered.
    #[error("工具 {name} 未注册。可用工具: {available:?}")]
    Unknown {
        /// The requested name.
        name: String,
        /// Names currently registered, for the error message.
        available: Vec<String>,
    },

    /// The provided parameters do not satisfy the tool's declared schema.
    #[error("工具 {name} 参数校验失败: {detail}")]
    Validation {
        /// Tool name.
        name: String,
        /// First schema violation, rendered by the validator.
        detail: String,
    },

    /// The tool ran but faulted internally.
    #[error("工具 {name} 执行失败: {detail}")]
    Execution {
        /// Tool name.
        name: String,
        /// The underlying failure message.
        detail: String,
    },

    /// A tool with this name is already registered.
    #[error("工具 {name} 已注册，请使用不同的名称")]
    Duplicate {
        /// The conflicting name.
        name: String,
    },
}

impl ToolError {
    /// Returns a short stable label (snake_case) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ToolError::Unknown { .. } => "tool_unknown",
            ToolError::Validation { .. } => "tool_validation_failed",
            ToolError::Execution { .. } => "tool_execution_failed",
            ToolError::Duplicate { .. } => "tool_duplicate",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// True for failures of the invocation itself (validation/execution),
    /// false for registry bookkeeping errors.
    pub fn is_invocation_failure(&self) -> bool {
        matches!(
            self,
            ToolError::Validation { .. } | ToolError::Execution { .. } | ToolError::Unknown { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn governor_error_labels_are_stable() {
        let e = GovernorError::StagePanic {
            node: "planner".into(),
            message: "boom".into(),
        };
        assert_eq!(e.as_label(), "stage_panic");
        assert!(e.as_message().contains("planner"));
    }

    #[test]
    fn tool_error_labels_and_classification() {
        let v = ToolError::Validation {
            name: "get_weather".into(),
            detail: "city is required".into(),
        };
        assert_eq!(v.as_label(), "tool_validation_failed");
        assert!(v.is_invocation_failure());

        let d = ToolError::Duplicate {
            name: "calculator".into(),
        };
        assert!(!d.is_invocation_failure());
    }

    #[test]
    fn stage_fault_carries_kind() {
        let f = StageFault::with_kind("no_intent", "no intent available");
        assert_eq!(f.kind, "no_intent");
        assert_eq!(f.to_string(), "no intent available");
    }
}
