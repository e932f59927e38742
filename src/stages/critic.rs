//! # Critic checkpoint: quality control and loop adjudication.
//!
//! Evaluates the pass's draft and decides the flow: accept, retry, or —
//! once the retry budget is exhausted — terminal failure. The checks run
//! in a fixed order and short-circuit; the first failing check's reason is
//! the one surfaced.
//!
//! ## Checks, in order
//! 1. draft present and non-whitespace;
//! 2. no tool whose latest recorded call failed (the call log is
//!    append-only across passes; a successful re-execution supersedes an
//!    earlier failure);
//! 3. draft at least [`MIN_ANSWER_CHARS`] characters;
//! 4. if the plan demands retrieval, documents were actually retrieved;
//! 5. intent-specific vocabulary (analysis / task execution wording).
//!
//! ## Retry accounting
//! Every rejection advances `retries`. While `retries ≤ max_retries` the
//! decision is `Retry`; beyond that it is `Fail` with a deterministic
//! message embedding the budget, the last rejection reason, and the
//! execution id — that message becomes the final answer.

use async_trait::async_trait;

use crate::error::StageFault;
use crate::events::Emitter;
use crate::state::{CriticDecision, StateUpdate, WorkflowState};

use super::Stage;

/// Minimum acceptable draft length, in characters.
pub const MIN_ANSWER_CHARS: usize = 10;

const ANALYSIS_KEYWORDS: [&str; 6] = ["分析", "趋势", "结果", "数据", "计算", "统计"];
const TASK_KEYWORDS: [&str; 5] = ["完成", "已执行", "成功", "调用", "执行"];
const RETRIEVAL_STEP_KEYWORDS: [&str; 3] = ["检索", "知识库", "RAG"];

/// The stage gating the feedback loop.
pub struct CriticStage;

impl CriticStage {
    /// Creates the critic.
    pub fn new() -> Self {
        Self
    }

    /// Runs the quality checks; `None` means the draft passed.
    fn first_rejection(state: &WorkflowState) -> Option<String> {
        let draft = state.draft_answer.as_deref().unwrap_or_default().trim();
        if draft.is_empty() {
            return Some("答案为空".to_string());
        }

        // The call log is append-only across retry passes; a re-executed
        // tool appends a fresh entry, so the latest call per name decides.
        let mut latest: std::collections::HashMap<&str, bool> = std::collections::HashMap::new();
        for call in &state.tool_calls {
            latest.insert(call.name.as_str(), call.success);
        }
        let mut failed: Vec<&str> = Vec::new();
        for call in &state.tool_calls {
            let name = call.name.as_str();
            if latest.get(name) == Some(&false) && !failed.contains(&name) {
                failed.push(name);
            }
        }
        if !failed.is_empty() {
            return Some(format!("工具调用失败：{}", failed.join(", ")));
        }

        let chars = draft.chars().count();
        if chars < MIN_ANSWER_CHARS {
            return Some(format!("答案过短（{chars} 字符）"));
        }

        let plan = state.plan.as_deref().unwrap_or_default();
        let plan_wants_retrieval = plan
            .iter()
            .any(|step| RETRIEVAL_STEP_KEYWORDS.iter().any(|k| step.contains(k)));
        if plan_wants_retrieval && state.retrieved_docs.is_empty() {
            return Some("计划要求检索操作但检索文档为空".to_string());
        }

        if state.intent.as_deref() == Some("analysis")
            && !ANALYSIS_KEYWORDS.iter().any(|k| draft.contains(k))
            && plan.iter().any(|step| step.contains("分析"))
        {
            return Some("分析类意图但答案缺少分析性内容".to_string());
        }

        if state.intent.as_deref() == Some("task")
            && !TASK_KEYWORDS.iter().any(|k| draft.contains(k))
            && plan
                .iter()
                .any(|step| step.contains("调用") || step.contains("工具"))
            && !state.tool_calls.is_empty()
        {
            return Some("任务类意图但答案缺少执行状态说明".to_string());
        }

        None
    }

    /// Shared rejection handling: advance the retry ledger and decide
    /// between another pass and terminal failure.
    fn handle_rejection(state: &WorkflowState, scope: &Emitter, reason: String) -> StateUpdate {
        let retries = state.retries + 1;
        let mut update = StateUpdate {
            retries: Some(retries),
            ..StateUpdate::default()
        };

        if retries > state.max_retries {
            let failure = format!(
                "智能体执行在重试 {} 次后失败。最后失败原因：{}。追踪ID：{}",
                state.max_retries,
                reason,
                scope.execution_id(),
            );
            update.critic_decision = Some(CriticDecision::Fail);
            update.critic_reason = Some(format!("超出最大重试次数：{reason}"));
            update.final_answer = Some(failure);
        } else {
            update.critic_decision = Some(CriticDecision::Retry);
            update.critic_reason = Some(reason);
        }
        update
    }
}

impl Default for CriticStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for CriticStage {
    fn name(&self) -> &'static str {
        "critic"
    }

    async fn run(
        &self,
        state: &WorkflowState,
        scope: &Emitter,
    ) -> Result<StateUpdate, StageFault> {
        if let Some(reason) = Self::first_rejection(state) {
            return Ok(Self::handle_rejection(state, scope, reason));
        }

        let mut update = StateUpdate::default();
        update.critic_decision = Some(CriticDecision::Accept);
        update.critic_reason = Some("全部检查通过".to_string());
        update.final_answer = state.draft_answer.clone();
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ToolCall;

    fn state_with_draft(draft: &str) -> WorkflowState {
        let mut state = WorkflowState::new("q", 2);
        state.intent = Some("qa".into());
        state.plan = Some(vec!["理解用户问题".to_string()]);
        state.draft_answer = Some(draft.to_string());
        state
    }

    #[test]
    fn empty_draft_is_rejected_first() {
        let mut state = state_with_draft("   ");
        // Even with a failed tool call, emptiness is surfaced first.
        state.tool_calls.push(ToolCall {
            name: "x".into(),
            input: serde_json::json!({}),
            output: None,
            success: false,
            error: Some("boom".into()),
        });
        assert_eq!(
            CriticStage::first_rejection(&state).as_deref(),
            Some("答案为空")
        );
    }

    #[test]
    fn failed_tool_calls_are_named() {
        let mut state = state_with_draft("这是一个足够长的草稿答案");
        state.tool_calls.push(ToolCall {
            name: "get_weather".into(),
            input: serde_json::json!({}),
            output: None,
            success: false,
            error: Some("参数校验失败".into()),
        });
        assert_eq!(
            CriticStage::first_rejection(&state).as_deref(),
            Some("工具调用失败：get_weather")
        );
    }

    #[test]
    fn short_drafts_report_their_char_count() {
        let state = state_with_draft("太短了");
        assert_eq!(
            CriticStage::first_rejection(&state).as_deref(),
            Some("答案过短（3 字符）")
        );
    }

    #[test]
    fn retrieval_demanding_plan_with_no_docs_is_rejected() {
        let mut state = state_with_draft("这是一个足够长的草稿答案");
        state.plan = Some(vec!["检索相关数据与资料".to_string()]);
        assert_eq!(
            CriticStage::first_rejection(&state).as_deref(),
            Some("计划要求检索操作但检索文档为空")
        );
    }

    #[test]
    fn analysis_draft_without_analysis_wording_is_rejected() {
        let mut state = state_with_draft("这里没有相关的词汇出现啊");
        state.intent = Some("analysis".into());
        state.plan = Some(vec!["对销量进行分析".to_string()]);
        assert_eq!(
            CriticStage::first_rejection(&state).as_deref(),
            Some("分析类意图但答案缺少分析性内容")
        );
    }

    #[test]
    fn task_draft_without_execution_wording_is_rejected() {
        let mut state = state_with_draft("这里没有相关的词汇出现啊");
        state.intent = Some("task".into());
        state.plan = Some(vec!["调用天气查询工具".to_string()]);
        state.tool_calls.push(ToolCall {
            name: "get_weather".into(),
            input: serde_json::json!({}),
            output: Some("晴".into()),
            success: true,
            error: None,
        });
        assert_eq!(
            CriticStage::first_rejection(&state).as_deref(),
            Some("任务类意图但答案缺少执行状态说明")
        );
    }

    #[test]
    fn good_draft_passes_all_checks() {
        let state = state_with_draft("这是一个足够长而且合格的回答");
        assert!(CriticStage::first_rejection(&state).is_none());
    }

    #[test]
    fn successful_re_execution_supersedes_an_earlier_failure() {
        let mut state = state_with_draft("这是一个足够长的草稿答案");
        state.tool_calls.push(ToolCall {
            name: "get_weather".into(),
            input: serde_json::json!({}),
            output: None,
            success: false,
            error: Some("boom".into()),
        });
        assert!(CriticStage::first_rejection(&state).is_some());

        // The retry pass re-ran the tool and it worked.
        state.tool_calls.push(ToolCall {
            name: "get_weather".into(),
            input: serde_json::json!({}),
            output: Some("晴".into()),
            success: true,
            error: None,
        });
        assert!(CriticStage::first_rejection(&state).is_none());
    }
}
