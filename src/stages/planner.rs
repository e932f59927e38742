//! Planning stage: intent-shaped plan generation and numbered-step parsing.

use async_trait::async_trait;
use regex::Regex;

use crate::error::StageFault;
use crate::events::Emitter;
use crate::state::{StateUpdate, WorkflowState};

use super::Stage;

/// Template-based planner.
///
/// Generates a numbered plan text for the classified intent, then parses
/// it into discrete steps. The generate→parse split is deliberate: a
/// model-backed planner replaces only the generation half and reuses the
/// same parser.
pub struct PlannerStage {
    step_pattern: Regex,
}

impl PlannerStage {
    /// Creates the planner.
    pub fn new() -> Self {
        Self {
            // "1. step" or "1) step"
            step_pattern: Regex::new(r"^\d+[.)]\s*(.+)$").expect("static step pattern"),
        }
    }

    fn generate_plan(&self, query: &str, intent: &str) -> String {
        match intent {
            "task" => format!(
                "1. 解析任务需求：{query}\n2. {query}\n3. 汇总执行结果并说明执行情况"
            ),
            "analysis" => format!(
                "1. 梳理分析目标：{query}\n2. 检索相关数据与资料\n3. 输出分析结果与趋势结论"
            ),
            _ => format!("1. 理解用户问题：{query}\n2. 基于已有知识组织回答"),
        }
    }

    /// Parses a plan text into steps.
    ///
    /// Numbered lines start a step; unnumbered non-empty lines continue the
    /// previous step; a text without any numbered line is one single step.
    pub fn parse_plan(&self, plan_text: &str) -> Vec<String> {
        let mut steps: Vec<String> = Vec::new();
        for line in plan_text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(captures) = self.step_pattern.captures(line) {
                steps.push(captures[1].to_string());
            } else if let Some(last) = steps.last_mut() {
                last.push(' ');
                last.push_str(line);
            }
        }
        if steps.is_empty() {
            vec![plan_text.to_string()]
        } else {
            steps
        }
    }
}

impl Default for PlannerStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for PlannerStage {
    fn name(&self) -> &'static str {
        "planner"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        _scope: &Emitter,
    ) -> Result<StateUpdate, StageFault> {
        let Some(intent) = state.intent.as_deref() else {
            return Err(StageFault::with_kind("no_intent", "no intent available"));
        };
        let plan_text = self.generate_plan(&state.user_query, intent);
        Ok(StateUpdate::plan(self.parse_plan(&plan_text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_steps_with_both_separators() {
        let planner = PlannerStage::new();
        let steps = planner.parse_plan("1. 第一步\n2) 第二步\n3. 第三步");
        assert_eq!(steps, vec!["第一步", "第二步", "第三步"]);
    }

    #[test]
    fn continuation_lines_extend_the_previous_step() {
        let planner = PlannerStage::new();
        let steps = planner.parse_plan("1. 查询数据库\n表=orders\n2. 汇总");
        assert_eq!(steps[0], "查询数据库 表=orders");
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn unnumbered_text_becomes_a_single_step() {
        let planner = PlannerStage::new();
        let steps = planner.parse_plan("直接回答即可");
        assert_eq!(steps, vec!["直接回答即可"]);
    }

    #[tokio::test]
    async fn missing_intent_is_a_stage_fault() {
        let planner = PlannerStage::new();
        let state = WorkflowState::new("q", 2);
        let scope = crate::events::Emitter::new(
            std::sync::Arc::new(crate::pipeline::EventPipeline::with_sinks(vec![])),
            "exec-t",
            None,
            None,
        );
        let err = planner.run(&state, &scope).await.unwrap_err();
        assert_eq!(err.kind, "no_intent");
    }
}
