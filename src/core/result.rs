//! # Execution report: the structured result returned to callers.
//!
//! Shields callers from the workflow's internals: every business field is
//! extracted from the typed final state with an explicit default, so a
//! missing or unset field can never fault report construction — runs that
//! were cut short still produce a complete report.

use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::state::WorkflowState;

use super::context::{ExecStatus, ExecutionContext};

fn duration_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Read-only snapshot returned to the caller at run end.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// The run's unique token.
    pub execution_id: String,
    /// Execution-level status.
    pub status: ExecStatus,
    /// Why the run ended, for any non-success status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
    /// Stage transitions executed.
    pub steps_count: u32,
    /// Wall-clock duration of the run.
    #[serde(serialize_with = "duration_secs")]
    pub execution_time: Duration,
    /// Final answer, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Classified intent, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Plan steps, when a plan was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
    /// Names of tools invoked, in call order.
    pub used_tools: Vec<String>,
    /// Whether retrieval produced documents.
    pub triggered_retrieval: bool,
    /// Number of retrieved documents.
    pub retrieved_docs_count: usize,
    /// Critic rejections consumed.
    pub retries_count: u32,
    /// Error message for failed/cut-short runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Stable error label for failed/cut-short runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Full final-state snapshot; present only when tracing is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_state_snapshot: Option<Value>,
}

impl ExecutionReport {
    /// Builds the report from the finalized context and final state.
    ///
    /// Extraction is defensive throughout: unset options stay `None`,
    /// containers default to empty, and nothing here can fail.
    pub fn from_parts(
        context: &ExecutionContext,
        state: &WorkflowState,
        execution_time: Duration,
        include_snapshot: bool,
        error_type: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            execution_id: context.execution_id.clone(),
            status: context.status,
            termination_reason: context.termination_reason.clone(),
            steps_count: context.steps_count,
            execution_time,
            answer: state.final_answer.clone(),
            intent: state.intent.clone(),
            plan: state.plan.clone(),
            used_tools: state.tool_calls.iter().map(|c| c.name.clone()).collect(),
            triggered_retrieval: !state.retrieved_docs.is_empty(),
            retrieved_docs_count: state.retrieved_docs.len(),
            retries_count: state.retries,
            error_message,
            error_type,
            final_state_snapshot: include_snapshot.then(|| state.snapshot()),
        }
    }

    /// Report for a run that never got to execute (e.g. the blocking entry
    /// point failed to construct its runtime).
    pub fn infrastructure_failure(
        execution_id: impl Into<String>,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let error_message = error_message.into();
        Self {
            execution_id: execution_id.into(),
            status: ExecStatus::Failed,
            termination_reason: Some(error_message.clone()),
            steps_count: 0,
            execution_time: Duration::ZERO,
            answer: None,
            intent: None,
            plan: None,
            used_tools: Vec::new(),
            triggered_retrieval: false,
            retrieved_docs_count: 0,
            retries_count: 0,
            error_message: Some(error_message),
            error_type: Some(error_type.into()),
            final_state_snapshot: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_survives_a_bare_state() {
        let context = ExecutionContext::new("exec-1", None, None)
            .finalize(ExecStatus::Success, None);
        let state = WorkflowState::new("q", 2);
        let report = ExecutionReport::from_parts(
            &context,
            &state,
            Duration::from_millis(5),
            false,
            None,
            None,
        );
        assert_eq!(report.answer, None);
        assert_eq!(report.used_tools.len(), 0);
        assert!(!report.triggered_retrieval);
        assert_eq!(report.retrieved_docs_count, 0);
        assert!(report.final_state_snapshot.is_none());
    }

    #[test]
    fn snapshot_is_attached_only_when_traced() {
        let context = ExecutionContext::new("exec-1", None, None)
            .finalize(ExecStatus::Success, None);
        let state = WorkflowState::new("q", 2);
        let report =
            ExecutionReport::from_parts(&context, &state, Duration::ZERO, true, None, None);
        let snapshot = report.final_state_snapshot.unwrap();
        assert_eq!(snapshot["user_query"], "q");
    }

    #[test]
    fn execution_time_serializes_as_seconds() {
        let report = ExecutionReport::infrastructure_failure("e", "runtime_error", "boom");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["execution_time"], serde_json::json!(0.0));
        assert_eq!(json["status"], "failed");
    }
}
