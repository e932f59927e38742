//! Retrieval gating stage.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StageFault;
use crate::events::Emitter;
use crate::state::{StateUpdate, WorkflowState};

use super::Stage;

/// Decides whether the retrieval branch should run.
///
/// Default policy: knowledge-seeking intents (`qa`, `analysis`) retrieve;
/// pure `task` intents do not, unless the query explicitly references the
/// knowledge base. When in doubt the decision is conservative — retrieve.
pub struct RetrievalDecisionStage {
    reference_keywords: Vec<&'static str>,
}

impl RetrievalDecisionStage {
    /// Creates the stage with the default keyword table.
    pub fn new() -> Self {
        Self {
            reference_keywords: vec!["知识库", "资料", "文档", "检索"],
        }
    }

    fn decide(&self, state: &WorkflowState) -> bool {
        if self
            .reference_keywords
            .iter()
            .any(|k| state.user_query.contains(k))
        {
            return true;
        }
        match state.intent.as_deref() {
            Some("task") => false,
            Some("qa") | Some("analysis") => true,
            // Undecidable input: conservative strategy, still retrieve.
            _ => true,
        }
    }
}

impl Default for RetrievalDecisionStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for RetrievalDecisionStage {
    fn name(&self) -> &'static str {
        "retrieval_decision"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _scope: &Emitter,
    ) -> Result<StateUpdate, StageFault> {
        let need = self.decide(state);
        let mut update = StateUpdate::default();
        update.need_retrieval = Some(need);
        update
            .memory
            .insert("retrieval_decision".into(), Value::Bool(need));
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_intent(query: &str, intent: &str) -> WorkflowState {
        let mut state = WorkflowState::new(query, 2);
        state.intent = Some(intent.into());
        state
    }

    #[test]
    fn qa_and_analysis_retrieve_by_default() {
        let stage = RetrievalDecisionStage::new();
        assert!(stage.decide(&state_with_intent("什么是向量数据库？", "qa")));
        assert!(stage.decide(&state_with_intent("分析销售趋势", "analysis")));
    }

    #[test]
    fn plain_tasks_skip_retrieval() {
        let stage = RetrievalDecisionStage::new();
        assert!(!stage.decide(&state_with_intent("调用天气查询工具，城市=北京", "task")));
    }

    #[test]
    fn knowledge_base_reference_forces_retrieval() {
        let stage = RetrievalDecisionStage::new();
        assert!(stage.decide(&state_with_intent("结合知识库资料发送周报", "task")));
    }

    #[test]
    fn missing_intent_is_conservative() {
        let stage = RetrievalDecisionStage::new();
        assert!(stage.decide(&WorkflowState::new("anything", 2)));
    }
}
