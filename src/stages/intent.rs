//! Intent classification stage.

use async_trait::async_trait;

use crate::error::StageFault;
use crate::events::Emitter;
use crate::state::{StateUpdate, WorkflowState};

use super::Stage;

/// Intents the default router emits.
const ALLOWED_INTENTS: [&str; 3] = ["qa", "task", "analysis"];

/// Keyword-based intent router.
///
/// Classifies the query into `task` (tool-flavored requests), `analysis`
/// (analytical requests), or the `qa` fallback. Unrecognizable input is
/// always `qa` — classification never faults a run. Applications with an
/// LLM-backed classifier swap this stage out.
pub struct IntentRouterStage {
    task_keywords: Vec<&'static str>,
    analysis_keywords: Vec<&'static str>,
}

impl IntentRouterStage {
    /// Creates the router with the default keyword tables.
    pub fn new() -> Self {
        Self {
            task_keywords: vec!["调用", "使用", "执行", "工具", "发送", "帮我"],
            analysis_keywords: vec!["分析", "统计", "趋势", "对比", "汇总"],
        }
    }

    fn classify(&self, query: &str) -> &'static str {
        if self.task_keywords.iter().any(|k| query.contains(k)) {
            return "task";
        }
        if self.analysis_keywords.iter().any(|k| query.contains(k)) {
            return "analysis";
        }
        "qa"
    }
}

impl Default for IntentRouterStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for IntentRouterStage {
    fn name(&self) -> &'static str {
        "intent_router"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _scope: &Emitter,
    ) -> Result<StateUpdate, StageFault> {
        let intent = self.classify(&state.user_query);
        debug_assert!(ALLOWED_INTENTS.contains(&intent));
        Ok(StateUpdate::intent(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_flavored_queries_are_tasks() {
        let router = IntentRouterStage::new();
        assert_eq!(router.classify("帮我调用天气查询工具，城市=北京"), "task");
        assert_eq!(router.classify("发送邮件给张三"), "task");
    }

    #[test]
    fn analytical_queries_are_analysis() {
        let router = IntentRouterStage::new();
        assert_eq!(router.classify("分析上个季度的销售趋势"), "analysis");
    }

    #[test]
    fn everything_else_falls_back_to_qa() {
        let router = IntentRouterStage::new();
        assert_eq!(router.classify("什么是向量数据库？"), "qa");
        assert_eq!(router.classify(""), "qa");
    }
}
