//! Built-in example tools.

use std::sync::Arc;

use serde_json::Value;

use super::{ToolDef, ToolRegistry};

/// Registry pre-loaded with the example tools (`get_weather`,
/// `calculator`). Applications typically start from this and register
/// their own tools on top.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    // Registration of the statically-defined tools cannot collide.
    let _ = registry.register(weather_tool());
    let _ = registry.register(calculator_tool());
    registry
}

fn weather_tool() -> ToolDef {
    ToolDef::new(
        "get_weather",
        "查询城市天气",
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "城市名称，例如：北京、上海" },
                "date": { "type": "string", "description": "日期，格式：YYYY-MM-DD，默认为今天" },
            },
            "required": ["city"],
        }),
        Arc::new(|_state, args| {
            let city = args["city"].as_str().unwrap_or_default();
            let result = match args.get("date").and_then(Value::as_str) {
                Some(date) => format!("{city}在{date}的天气：晴朗，温度 25°C，湿度 60%"),
                None => format!("{city}今天天气晴朗，温度 25°C，湿度 60%"),
            };
            Ok(Value::String(result))
        }),
    )
    .expect("builtin weather schema is valid")
}

fn calculator_tool() -> ToolDef {
    ToolDef::new(
        "calculator",
        "对两个数执行四则运算",
        serde_json::json!({
            "type": "object",
            "properties": {
                "operation": { "type": "string", "description": "加/减/乘/除 或 add/sub/mul/div" },
                "a": { "type": "string", "description": "第一个数" },
                "b": { "type": "string", "description": "第二个数" },
            },
            "required": ["operation", "a", "b"],
        }),
        Arc::new(|_state, args| {
            let op = args["operation"].as_str().unwrap_or_default();
            let a = parse_operand(&args["a"])?;
            let b = parse_operand(&args["b"])?;
            let value = match op {
                "加" | "add" | "+" => a + b,
                "减" | "sub" | "-" => a - b,
                "乘" | "mul" | "*" => a * b,
                "除" | "div" | "/" => {
                    if b == 0.0 {
                        return Err("除数不能为零".to_string());
                    }
                    a / b
                }
                other => return Err(format!("不支持的运算: {other}")),
            };
            Ok(serde_json::json!({ "result": value }))
        }),
    )
    .expect("builtin calculator schema is valid")
}

fn parse_operand(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("无法解析数字: {n}")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("无法解析数字: {s}")),
        other => Err(format!("无法解析数字: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkflowState;

    #[test]
    fn weather_formats_with_and_without_date() {
        let registry = builtin_registry();
        let state = WorkflowState::new("q", 2);
        let mut log = Vec::new();

        let today = registry
            .execute(
                "get_weather",
                &state,
                &serde_json::json!({"city": "北京"}),
                &mut log,
            )
            .unwrap();
        assert_eq!(today, serde_json::json!("北京今天天气晴朗，温度 25°C，湿度 60%"));

        let dated = registry
            .execute(
                "get_weather",
                &state,
                &serde_json::json!({"city": "上海", "date": "2026-08-01"}),
                &mut log,
            )
            .unwrap();
        assert!(dated.as_str().unwrap().contains("2026-08-01"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn calculator_divide_by_zero_is_an_execution_error() {
        let registry = builtin_registry();
        let state = WorkflowState::new("q", 2);
        let mut log = Vec::new();

        let err = registry
            .execute(
                "calculator",
                &state,
                &serde_json::json!({"operation": "除", "a": "1", "b": "0"}),
                &mut log,
            )
            .unwrap_err();
        assert_eq!(err.as_label(), "tool_execution_failed");
    }

    #[test]
    fn calculator_adds_string_operands() {
        let registry = builtin_registry();
        let state = WorkflowState::new("q", 2);
        let mut log = Vec::new();

        let result = registry
            .execute(
                "calculator",
                &state,
                &serde_json::json!({"operation": "加", "a": "2", "b": "3"}),
                &mut log,
            )
            .unwrap();
        assert_eq!(result["result"], serde_json::json!(5.0));
    }
}
