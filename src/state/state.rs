//! # Workflow state: the payload threaded through stages.
//!
//! [`WorkflowState`] is the single source of truth for one run's business
//! data. Stages read it and return a [`StateUpdate`](crate::state::StateUpdate)
//! partial; the graph applies updates in execution order.
//!
//! ## Rules
//! - Every field has a declared default, so report synthesis never probes
//!   for presence — it reads typed options and containers.
//! - `user_query` is immutable once set.
//! - `tool_calls`, `observations` are append-only; their order matches
//!   stage execution order within the run.
//! - `retries` is monotonic non-decreasing and only the critic advances it.
//! - `final_answer` is set iff `critic_decision` is `Accept` or `Fail`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decision produced by the critic checkpoint.
///
/// Routing treats an absent decision as [`CriticDecision::Retry`]
/// (fail-open toward another attempt rather than silently accepting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticDecision {
    /// Draft accepted; `final_answer` carries the draft.
    Accept,
    /// Draft rejected; the loop re-enters planning.
    Retry,
    /// Retry budget exhausted; `final_answer` carries the failure message.
    Fail,
}

impl CriticDecision {
    /// True for the decisions that end the loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, CriticDecision::Accept | CriticDecision::Fail)
    }
}

/// One tool invocation recorded on the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Registry name of the tool.
    pub name: String,
    /// Parameters the call was made with.
    pub input: Value,
    /// Rendered output, if the call succeeded.
    pub output: Option<String>,
    /// Whether the call succeeded.
    pub success: bool,
    /// Failure detail, if the call failed.
    pub error: Option<String>,
}

/// One entry of the tool observation log.
///
/// Appended by the registry on **every** invocation, success or failure,
/// for later inspection by the critic and planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Tool name.
    pub tool: String,
    /// Arguments after validation (raw arguments when validation failed).
    pub args: Value,
    /// Tool result, `null` on failure.
    pub result: Option<Value>,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Failure detail, if any.
    pub error: Option<String>,
    /// Wall-clock time of the invocation.
    pub timestamp: DateTime<Utc>,
}

/// The business payload of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The user's query. Immutable once set.
    pub user_query: String,
    /// Classified intent (`"qa"` | `"task"` | `"analysis"` by default).
    #[serde(default)]
    pub intent: Option<String>,
    /// Ordered plan steps produced by the planner.
    #[serde(default)]
    pub plan: Option<Vec<String>>,
    /// Whether the retrieval branch should run. `None` until decided.
    #[serde(default)]
    pub need_retrieval: Option<bool>,
    /// Documents produced by the retrieval branch. Empty when skipped.
    #[serde(default)]
    pub retrieved_docs: Vec<String>,
    /// Tool calls recorded during draft synthesis. Append-only.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Tool invocation trace written by the registry. Append-only.
    #[serde(default)]
    pub observations: Vec<Observation>,
    /// Draft produced by the draft-synthesis stage.
    #[serde(default)]
    pub draft_answer: Option<String>,
    /// Terminal answer. Set iff the critic decided Accept or Fail.
    #[serde(default)]
    pub final_answer: Option<String>,
    /// Rejections so far. Monotonic; advanced only by the critic.
    #[serde(default)]
    pub retries: u32,
    /// Retry budget, fixed per run.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Last critic decision, if any.
    #[serde(default)]
    pub critic_decision: Option<CriticDecision>,
    /// Reason attached to the last critic decision.
    #[serde(default)]
    pub critic_reason: Option<String>,
    /// Free-form diagnostic side channel (stage faults, retrieval stats).
    #[serde(default)]
    pub memory: BTreeMap<String, Value>,
}

fn default_max_retries() -> u32 {
    2
}

impl WorkflowState {
    /// Creates an initial state for `query` with the given retry budget.
    pub fn new(query: impl Into<String>, max_retries: u32) -> Self {
        Self {
            user_query: query.into(),
            intent: None,
            plan: None,
            need_retrieval: None,
            retrieved_docs: Vec::new(),
            tool_calls: Vec::new(),
            observations: Vec::new(),
            draft_answer: None,
            final_answer: None,
            retries: 0,
            max_retries,
            critic_decision: None,
            critic_reason: None,
            memory: BTreeMap::new(),
        }
    }

    /// Applies a partial update produced by a stage.
    ///
    /// `Option` fields replace only when `Some`; `tool_calls`,
    /// `observations` and `memory` entries are appended/merged.
    pub fn apply(&mut self, update: crate::state::StateUpdate) {
        if let Some(intent) = update.intent {
            self.intent = Some(intent);
        }
        if let Some(plan) = update.plan {
            self.plan = Some(plan);
        }
        if let Some(need) = update.need_retrieval {
            self.need_retrieval = Some(need);
        }
        if let Some(docs) = update.retrieved_docs {
            self.retrieved_docs = docs;
        }
        self.tool_calls.extend(update.tool_calls);
        self.observations.extend(update.observations);
        if let Some(draft) = update.draft_answer {
            self.draft_answer = Some(draft);
        }
        if let Some(answer) = update.final_answer {
            self.final_answer = Some(answer);
        }
        if let Some(retries) = update.retries {
            self.retries = retries;
        }
        if let Some(decision) = update.critic_decision {
            self.critic_decision = Some(decision);
        }
        if let Some(reason) = update.critic_reason {
            self.critic_reason = Some(reason);
        }
        for (key, value) in update.memory {
            self.memory.insert(key, value);
        }
    }

    /// Records a stage fault into the diagnostic side channel.
    pub fn record_fault(&mut self, node: &str, message: &str) {
        self.memory
            .insert(format!("{node}_error"), Value::String(message.to_string()));
    }

    /// Resets the output fields owned by `node` to their defaults.
    ///
    /// Called by the graph after a stage fault so a stale value from a
    /// previous pass cannot satisfy the critic.
    pub fn clear_outputs_of(&mut self, node: &str) {
        match node {
            "intent_router" => self.intent = None,
            "planner" => self.plan = None,
            "retrieval_decision" => self.need_retrieval = None,
            "retrieval" => self.retrieved_docs.clear(),
            "draft_answer" => self.draft_answer = None,
            "critic" => self.critic_decision = None,
            _ => {}
        }
    }

    /// Clears the previous pass's decision when the loop re-enters
    /// planning. The last rejection reason is kept for visibility.
    pub fn begin_retry_pass(&mut self) {
        self.critic_decision = None;
    }

    /// Serializes the full state for snapshot events and traced reports.
    /// Serialization problems degrade to an error marker, never a fault.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "_serialization_error": e.to_string() })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateUpdate;

    #[test]
    fn apply_replaces_scalars_and_appends_sequences() {
        let mut state = WorkflowState::new("查询北京天气", 2);
        let mut update = StateUpdate::default();
        update.intent = Some("task".into());
        update.tool_calls.push(ToolCall {
            name: "get_weather".into(),
            input: serde_json::json!({"city": "北京"}),
            output: Some("晴".into()),
            success: true,
            error: None,
        });
        update
            .memory
            .insert("retrieval_count".into(), serde_json::json!(0));
        state.apply(update);

        assert_eq!(state.intent.as_deref(), Some("task"));
        assert_eq!(state.tool_calls.len(), 1);
        assert_eq!(state.memory["retrieval_count"], serde_json::json!(0));

        // A second update with no intent leaves the previous value alone.
        state.apply(StateUpdate::default());
        assert_eq!(state.intent.as_deref(), Some("task"));
    }

    #[test]
    fn clear_outputs_resets_only_the_named_node() {
        let mut state = WorkflowState::new("q", 2);
        state.intent = Some("qa".into());
        state.draft_answer = Some("草稿".into());
        state.clear_outputs_of("draft_answer");
        assert!(state.draft_answer.is_none());
        assert_eq!(state.intent.as_deref(), Some("qa"));
    }

    #[test]
    fn record_fault_lands_in_memory() {
        let mut state = WorkflowState::new("q", 2);
        state.record_fault("planner", "no intent available");
        assert_eq!(
            state.memory["planner_error"],
            Value::String("no intent available".into())
        );
    }

    #[test]
    fn snapshot_round_trips_through_serde() {
        let mut state = WorkflowState::new("q", 1);
        state.retries = 1;
        state.critic_decision = Some(CriticDecision::Retry);
        let snapshot = state.snapshot();
        let back: WorkflowState = serde_json::from_value(snapshot).unwrap();
        assert_eq!(back.retries, 1);
        assert_eq!(back.critic_decision, Some(CriticDecision::Retry));
    }
}
