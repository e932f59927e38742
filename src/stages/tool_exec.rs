//! Plan-driven tool execution.
//!
//! Scans plan steps for tool mentions, extracts parameters from the step
//! text, and executes the matches through the registry. Used by the
//! draft-synthesis stage; tool failures become failed [`ToolCall`] entries
//! for the critic to inspect, never run-level faults.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use crate::events::{Emitter, ErrorInfo, EventSource, EventType};
use crate::state::{Observation, ToolCall, WorkflowState};
use crate::tools::ToolRegistry;

/// One extracted invocation request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExtractedCall {
    pub name: String,
    pub params: Value,
    pub step: String,
}

/// Executes plan-implied tool calls through a shared registry.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    keywords: Vec<&'static str>,
    name_patterns: Vec<Regex>,
    name_mapping: Vec<(&'static str, &'static str)>,
    param_mapping: Vec<(&'static str, &'static str)>,
    param_pattern: Regex,
}

impl ToolExecutor {
    /// Creates an executor over `registry`.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        let patterns = [
            r"调用(\w+)工具",
            r"使用(\w+)工具",
            r"执行(\w+)工具",
            r"调用(\w+)",
        ];
        Self {
            registry,
            keywords: vec!["调用", "使用", "执行", "工具"],
            name_patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("static tool-name pattern"))
                .collect(),
            name_mapping: vec![
                ("天气查询", "get_weather"),
                ("查询天气", "get_weather"),
                ("天气", "get_weather"),
                ("发送邮件", "send_email"),
                ("邮件发送", "send_email"),
                ("邮件", "send_email"),
                ("查询数据库", "query_database"),
                ("数据库查询", "query_database"),
                ("数据库", "query_database"),
                ("计算器", "calculator"),
                ("计算", "calculator"),
            ],
            param_mapping: vec![
                ("城市名", "city"),
                ("城市", "city"),
                ("日期", "date"),
                ("收件人", "to"),
                ("主题", "subject"),
                ("内容", "content"),
                ("抄送", "cc"),
                ("表名", "table"),
                ("表", "table"),
                ("条件", "conditions"),
                ("限制", "limit"),
                ("操作", "operation"),
                ("运算", "operation"),
                ("第一个数", "a"),
                ("第二个数", "b"),
            ],
            // key=value or key：value, values end at a comma
            param_pattern: Regex::new(r"(\w+)[=：]\s*([^，,]+)").expect("static param pattern"),
        }
    }

    /// Runs every plan-implied tool call not already recorded on the state.
    ///
    /// Returns the new tool-call entries and the observations the registry
    /// appended, in execution order.
    pub async fn run(
        &self,
        state: &WorkflowState,
        scope: &Emitter,
    ) -> (Vec<ToolCall>, Vec<Observation>) {
        let Some(plan) = &state.plan else {
            return (Vec::new(), Vec::new());
        };

        // Skip tools whose latest recorded call already succeeded;
        // previously failed tools are retried on the next pass.
        let mut latest: std::collections::HashMap<&str, bool> = std::collections::HashMap::new();
        for call in &state.tool_calls {
            latest.insert(call.name.as_str(), call.success);
        }
        let existing: HashSet<&str> = latest
            .iter()
            .filter(|(_, success)| **success)
            .map(|(name, _)| *name)
            .collect();
        let mut calls = Vec::new();
        let mut observations = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for extracted in self.extract_calls(plan) {
            if existing.contains(extracted.name.as_str()) || !seen.insert(extracted.name.clone()) {
                continue;
            }
            calls.push(
                self.execute_one(state, scope, &extracted, &mut observations)
                    .await,
            );
        }
        (calls, observations)
    }

    /// Scans plan steps for tool mentions.
    pub(crate) fn extract_calls(&self, plan: &[String]) -> Vec<ExtractedCall> {
        let mut extracted = Vec::new();
        for step in plan {
            if !self.keywords.iter().any(|k| step.contains(k)) {
                continue;
            }
            let Some(name) = self.extract_tool_name(step) else {
                continue;
            };
            extracted.push(ExtractedCall {
                params: self.extract_params(step),
                name,
                step: step.clone(),
            });
        }
        extracted
    }

    fn extract_tool_name(&self, step: &str) -> Option<String> {
        for pattern in &self.name_patterns {
            if let Some(captures) = pattern.captures(step) {
                return Some(self.normalize_tool_name(&captures[1].to_lowercase()));
            }
        }
        for (chinese, english) in &self.name_mapping {
            if step.contains(chinese) {
                return Some((*english).to_string());
            }
        }
        None
    }

    fn normalize_tool_name(&self, name: &str) -> String {
        for (chinese, english) in &self.name_mapping {
            if *chinese == name {
                return (*english).to_string();
            }
        }
        for (chinese, english) in &self.name_mapping {
            if name.contains(chinese) || chinese.contains(name) {
                return (*english).to_string();
            }
        }
        name.replace([' ', '-'], "_")
    }

    fn extract_params(&self, step: &str) -> Value {
        let mut params = Map::new();
        for captures in self.param_pattern.captures_iter(step) {
            let key = self.normalize_param_name(&captures[1]);
            let value = captures[2].trim().trim_matches(['"', '\'']).to_string();
            params.insert(key, Value::String(value));
        }
        Value::Object(params)
    }

    fn normalize_param_name(&self, name: &str) -> String {
        for (chinese, english) in &self.param_mapping {
            if *chinese == name {
                return (*english).to_string();
            }
        }
        name.to_string()
    }

    async fn execute_one(
        &self,
        state: &WorkflowState,
        scope: &Emitter,
        extracted: &ExtractedCall,
        observations: &mut Vec<Observation>,
    ) -> ToolCall {
        scope
            .send(
                scope
                    .event(EventType::ToolCallStarted, EventSource::Tool)
                    .with_tool(&extracted.name)
                    .with_payload(serde_json::json!({
                        "args": &extracted.params,
                        "step": &extracted.step,
                    })),
            )
            .await;

        match self
            .registry
            .execute(&extracted.name, state, &extracted.params, observations)
        {
            Ok(result) => {
                scope
                    .send(
                        scope
                            .event(EventType::ToolCallCompleted, EventSource::Tool)
                            .with_tool(&extracted.name)
                            .with_payload(serde_json::json!({ "result": &result })),
                    )
                    .await;
                let output = match &result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                ToolCall {
                    name: extracted.name.clone(),
                    input: extracted.params.clone(),
                    output: Some(output),
                    success: true,
                    error: None,
                }
            }
            Err(error) => {
                scope
                    .send(
                        scope
                            .event(EventType::ToolCallFailed, EventSource::Tool)
                            .with_tool(&extracted.name)
                            .with_error_info(ErrorInfo::new(error.as_label(), error.as_message())),
                    )
                    .await;
                ToolCall {
                    name: extracted.name.clone(),
                    input: extracted.params.clone(),
                    output: None,
                    success: false,
                    error: Some(error.as_message()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin_registry;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Arc::new(builtin_registry()))
    }

    #[test]
    fn extracts_tool_and_params_from_step_text() {
        let calls = executor().extract_calls(&[
            "调用天气查询工具，城市=北京，日期=2026-08-01".to_string(),
            "汇总执行结果".to_string(),
        ]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].params["city"], "北京");
        assert_eq!(calls[0].params["date"], "2026-08-01");
    }

    #[test]
    fn chinese_colon_separates_params_too() {
        let calls = executor().extract_calls(&["使用计算器工具，操作：加，第一个数：2，第二个数：3".to_string()]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "calculator");
        assert_eq!(calls[0].params["operation"], "加");
        assert_eq!(calls[0].params["a"], "2");
        assert_eq!(calls[0].params["b"], "3");
    }

    #[test]
    fn steps_without_tool_keywords_are_ignored() {
        let calls = executor().extract_calls(&["理解用户问题".to_string()]);
        assert!(calls.is_empty());
    }
}
