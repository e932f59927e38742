//! # Execution context: one run's bookkeeping.
//!
//! Separation of concerns, mirrored throughout the crate:
//! - the context records *how* the run executed (steps, timing, node
//!   order, captured faults);
//! - [`WorkflowState`](crate::state::WorkflowState) records *what* was
//!   executed (business data);
//! - the pipeline records the discrete facts along the way.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Execution-level status of a run. Carries no business semantics — a
/// `Success` run may still hold a critic-rejected answer only in the sense
/// that the graph finished; business failure surfaces as `Failed` with a
/// retry-exhaustion reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    /// Stages are still executing.
    Running,
    /// The graph reached DONE with an accepted answer.
    Success,
    /// Infrastructure fault or retry exhaustion.
    Failed,
    /// The wall-clock budget fired between stages.
    Timeout,
    /// The governor cut the run short (step/tool budget, dropped consumer).
    Terminated,
}

impl ExecStatus {
    /// Stable lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            ExecStatus::Running => "running",
            ExecStatus::Success => "success",
            ExecStatus::Failed => "failed",
            ExecStatus::Timeout => "timeout",
            ExecStatus::Terminated => "terminated",
        }
    }
}

/// One captured fault record.
#[derive(Debug, Clone, Serialize)]
pub struct FaultRecord {
    /// Stable fault classification.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Node the fault was captured at, when stage-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Bookkeeping for one run, owned exclusively by the governor.
///
/// Immutable once finalized: [`ExecutionContext::finalize`] consumes the
/// running context and sets `end_time`, after which no mutation path
/// remains.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    /// Opaque unique token for the run.
    pub execution_id: String,
    /// External request correlation, if any.
    pub request_id: Option<String>,
    /// User correlation, if any.
    pub user_id: Option<String>,
    /// Wall-clock start.
    pub start_time: DateTime<Utc>,
    /// Wall-clock end; set exactly once, by finalization.
    pub end_time: Option<DateTime<Utc>>,
    /// Execution-level status.
    pub status: ExecStatus,
    /// Set iff `status != Success`.
    pub termination_reason: Option<String>,
    /// Stage transitions executed so far.
    pub steps_count: u32,
    /// Node names in execution order. Append-only.
    pub node_execution_order: Vec<String>,
    /// Captured fault records, in order.
    pub errors: Vec<FaultRecord>,
    /// Monotonic clock for budget math (not serialized).
    #[serde(skip)]
    started: Instant,
}

impl ExecutionContext {
    /// Opens the context for a new run.
    pub fn new(
        execution_id: impl Into<String>,
        request_id: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            request_id,
            user_id,
            start_time: Utc::now(),
            end_time: None,
            status: ExecStatus::Running,
            termination_reason: None,
            steps_count: 0,
            node_execution_order: Vec::new(),
            errors: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Time elapsed since the run started (monotonic).
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Records that `node` is about to execute.
    pub fn record_step(&mut self, node: &str) {
        self.steps_count += 1;
        self.node_execution_order.push(node.to_string());
    }

    /// Records a captured fault.
    pub fn record_error(&mut self, kind: impl Into<String>, message: impl Into<String>, node: Option<String>) {
        self.errors.push(FaultRecord {
            kind: kind.into(),
            message: message.into(),
            node,
        });
    }

    /// Closes the context. Consumes the running value so nothing can
    /// mutate it after `end_time` is set.
    pub fn finalize(mut self, status: ExecStatus, termination_reason: Option<String>) -> Self {
        self.status = status;
        self.termination_reason = termination_reason;
        self.end_time = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_steps_in_order() {
        let mut ctx = ExecutionContext::new("exec-1", None, None);
        ctx.record_step("intent_router");
        ctx.record_step("planner");
        assert_eq!(ctx.steps_count, 2);
        assert_eq!(ctx.node_execution_order, vec!["intent_router", "planner"]);
    }

    #[test]
    fn finalize_sets_terminal_fields() {
        let ctx = ExecutionContext::new("exec-1", None, None);
        let ctx = ctx.finalize(ExecStatus::Timeout, Some("执行超时: 1秒".into()));
        assert_eq!(ctx.status, ExecStatus::Timeout);
        assert!(ctx.end_time.is_some());
        assert_eq!(ctx.termination_reason.as_deref(), Some("执行超时: 1秒"));
    }
}
