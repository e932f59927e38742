//! Draft synthesis stage.
//!
//! The action half of a pass: executes plan-implied tool calls through the
//! registry, then synthesizes an intent-shaped draft from the plan, the
//! retrieved documents, and the tool outcomes. The critic judges the
//! result.

use async_trait::async_trait;

use crate::error::StageFault;
use crate::events::Emitter;
use crate::state::{StateUpdate, ToolCall, WorkflowState};

use super::{Stage, ToolExecutor};

/// Template-based draft synthesis over plan, docs, and tool outcomes.
pub struct DraftAnswerStage {
    tools: ToolExecutor,
}

impl DraftAnswerStage {
    /// Creates the stage around a tool executor.
    pub fn new(tools: ToolExecutor) -> Self {
        Self { tools }
    }

    fn qa_answer(state: &WorkflowState, plan: &[String]) -> String {
        let mut answer = format!(
            "用户问题：{}\n\n基于当前信息给出的初步回答如下：\n- {}",
            state.user_query,
            plan.first().map(String::as_str).unwrap_or_default(),
        );
        if !state.retrieved_docs.is_empty() {
            answer.push_str(&format!(
                "\n\n参考资料（{} 条）：\n- {}",
                state.retrieved_docs.len(),
                state.retrieved_docs.join("\n- "),
            ));
        }
        answer
    }

    fn task_answer(plan: &[String], calls: &[ToolCall]) -> String {
        let steps = plan
            .iter()
            .enumerate()
            .map(|(idx, step)| format!("{}. {step}", idx + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let mut answer = format!("针对任务请求，已生成如下执行方案：\n\n{steps}");
        if calls.is_empty() {
            answer.push_str("\n\n（当前为草稿结果，尚未执行具体工具）");
        } else {
            answer.push_str("\n\n已执行工具调用：");
            for call in calls {
                match (&call.output, &call.error) {
                    (Some(output), _) => {
                        answer.push_str(&format!("\n- {}：{}", call.name, output));
                    }
                    (None, Some(error)) => {
                        answer.push_str(&format!("\n- {} 失败：{}", call.name, error));
                    }
                    (None, None) => {
                        answer.push_str(&format!("\n- {}：执行成功", call.name));
                    }
                }
            }
        }
        answer
    }

    fn analysis_answer(state: &WorkflowState, plan: &[String]) -> String {
        let steps = plan
            .iter()
            .map(|step| format!("- {step}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut answer = format!("针对分析请求，生成初步分析思路如下：\n\n{steps}");
        if !state.retrieved_docs.is_empty() {
            answer.push_str(&format!("\n\n已检索到 {} 条相关资料。", state.retrieved_docs.len()));
        }
        answer.push_str("\n\n后续可基于数据或工具进一步完善分析结论。");
        answer
    }
}

#[async_trait]
impl Stage for DraftAnswerStage {
    fn name(&self) -> &'static str {
        "draft_answer"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        scope: &Emitter,
    ) -> Result<StateUpdate, StageFault> {
        let mut update = StateUpdate::default();

        let Some(plan) = state.plan.clone() else {
            update.draft_answer = Some(format!(
                "无法生成执行计划，直接回答用户问题：{}",
                state.user_query
            ));
            return Ok(update);
        };

        let (calls, observations) = self.tools.run(state, scope).await;

        let draft = match state.intent.as_deref() {
            Some("qa") => Self::qa_answer(state, &plan),
            Some("task") => Self::task_answer(&plan, &calls),
            Some("analysis") => Self::analysis_answer(state, &plan),
            _ => format!(
                "收到用户请求：{}\n已生成初步计划：{}",
                state.user_query,
                plan.join("；"),
            ),
        };

        update.draft_answer = Some(draft);
        update.tool_calls = calls;
        update.observations = observations;
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_answer_reports_tool_outcomes() {
        let plan = vec!["调用天气查询工具，城市=北京".to_string()];
        let calls = vec![ToolCall {
            name: "get_weather".into(),
            input: serde_json::json!({"city": "北京"}),
            output: Some("北京今天天气晴朗".into()),
            success: true,
            error: None,
        }];
        let answer = DraftAnswerStage::task_answer(&plan, &calls);
        assert!(answer.contains("已执行工具调用"));
        assert!(answer.contains("get_weather：北京今天天气晴朗"));
    }

    #[test]
    fn task_answer_without_calls_keeps_the_draft_note() {
        let answer = DraftAnswerStage::task_answer(&["整理清单".to_string()], &[]);
        assert!(answer.contains("尚未执行具体工具"));
    }

    #[test]
    fn qa_answer_lists_retrieved_docs() {
        let mut state = WorkflowState::new("什么是向量数据库？", 2);
        state.retrieved_docs = vec!["向量数据库存储向量".to_string()];
        let answer = DraftAnswerStage::qa_answer(&state, &["理解用户问题".to_string()]);
        assert!(answer.contains("参考资料（1 条）"));
    }
}
