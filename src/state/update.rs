//! Partial state update returned by stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CriticDecision, Observation, ToolCall};

/// The explicit partial-update type a stage returns.
///
/// `None` scalar fields leave the state unchanged; the vectors are appended
/// and `memory` entries are merged. This makes stage outputs inspectable
/// (the streaming mode yields one `StateUpdate` per stage) and keeps the
/// merge semantics in one place,
/// [`WorkflowState::apply`](crate::state::WorkflowState::apply).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Replaces `intent` when `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Replaces `plan` when `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
    /// Replaces `need_retrieval` when `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_retrieval: Option<bool>,
    /// Replaces `retrieved_docs` when `Some` (an empty list is a valid,
    /// deliberate outcome of the retrieval branch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_docs: Option<Vec<String>>,
    /// Appended to the state's `tool_calls`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Appended to the state's `observations`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<Observation>,
    /// Replaces `draft_answer` when `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_answer: Option<String>,
    /// Replaces `final_answer` when `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    /// Replaces `retries` when `Some`. Only the critic sets this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Replaces `critic_decision` when `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_decision: Option<CriticDecision>,
    /// Replaces `critic_reason` when `Some`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_reason: Option<String>,
    /// Merged into the state's `memory`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub memory: BTreeMap<String, Value>,
}

impl StateUpdate {
    /// An update that only sets the intent.
    pub fn intent(intent: impl Into<String>) -> Self {
        Self {
            intent: Some(intent.into()),
            ..Self::default()
        }
    }

    /// An update that only sets the plan.
    pub fn plan(steps: Vec<String>) -> Self {
        Self {
            plan: Some(steps),
            ..Self::default()
        }
    }

    /// An update that only records a memory entry.
    pub fn memo(key: impl Into<String>, value: Value) -> Self {
        let mut memory = BTreeMap::new();
        memory.insert(key.into(), value);
        Self {
            memory,
            ..Self::default()
        }
    }

    /// True when the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.intent.is_none()
            && self.plan.is_none()
            && self.need_retrieval.is_none()
            && self.retrieved_docs.is_none()
            && self.tool_calls.is_empty()
            && self.observations.is_empty()
            && self.draft_answer.is_none()
            && self.final_answer.is_none()
            && self.retries.is_none()
            && self.critic_decision.is_none()
            && self.critic_reason.is_none()
            && self.memory.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_update_is_empty() {
        assert!(StateUpdate::default().is_empty());
        assert!(!StateUpdate::intent("qa").is_empty());
    }

    #[test]
    fn serialization_skips_unset_fields() {
        let update = StateUpdate::intent("task");
        let json = serde_json::to_value(&update).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["intent"], "task");
    }
}
