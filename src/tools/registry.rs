//! # Tool registry: validated, observable tool invocation.
//!
//! [`ToolRegistry`] maps names to [`ToolDef`]s. Each definition declares a
//! JSON Schema for its parameters; `execute` validates arguments against
//! it before calling the tool function, and appends an
//! [`Observation`](crate::state::Observation) to the provided log on
//! **every** invocation — validation failure, execution failure, or
//! success — so the critic and planner can inspect what happened.
//!
//! The registry is immutable after construction (`register` takes `&mut
//! self`, invocation takes `&self`), which makes it safe to share behind
//! an `Arc` across concurrent runs without locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::error::ToolError;
use crate::state::{Observation, WorkflowState};

/// Tool function: reads the state, receives validated arguments, returns a
/// structured result or a failure message.
pub type ToolFn = Arc<dyn Fn(&WorkflowState, &Value) -> Result<Value, String> + Send + Sync>;

/// One registered tool.
pub struct ToolDef {
    /// Unique registry name.
    pub name: String,
    /// Human-readable description (tool catalog surface).
    pub description: String,
    /// Declared parameter schema (JSON Schema).
    pub schema: Value,
    validator: jsonschema::Validator,
    func: ToolFn,
}

impl ToolDef {
    /// Creates a definition, compiling the parameter schema.
    ///
    /// Fails with [`ToolError::Validation`] when the schema itself is
    /// malformed.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        func: ToolFn,
    ) -> Result<Self, ToolError> {
        let name = name.into();
        let validator = jsonschema::validator_for(&schema).map_err(|e| ToolError::Validation {
            name: name.clone(),
            detail: format!("schema 无效: {e}"),
        })?;
        Ok(Self {
            name,
            description: description.into(),
            schema,
            validator,
            func,
        })
    }

    /// Catalog entry for this tool: `{name, description, parameters}`.
    pub fn catalog_entry(&self) -> Value {
        serde_json::json!({
            "name": &self.name,
            "description": &self.description,
            "parameters": &self.schema,
        })
    }
}

/// Name-keyed tool collection with validated execution.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDef>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. Names must be unique.
    pub fn register(&mut self, def: ToolDef) -> Result<(), ToolError> {
        if self.tools.contains_key(&def.name) {
            return Err(ToolError::Duplicate { name: def.name });
        }
        self.tools.insert(def.name.clone(), def);
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Looks up a definition.
    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.tools.get(name)
    }

    /// Catalog of all tools (`{name, description, parameters}` entries).
    pub fn catalog(&self) -> Vec<Value> {
        self.tools.values().map(ToolDef::catalog_entry).collect()
    }

    /// Validates `params` against the tool's schema without executing.
    pub fn validate_params(&self, name: &str, params: &Value) -> Result<(), ToolError> {
        let def = self.tools.get(name).ok_or_else(|| ToolError::Unknown {
            name: name.to_string(),
            available: self.names(),
        })?;
        def.validator
            .validate(params)
            .map_err(|e| ToolError::Validation {
                name: name.to_string(),
                detail: e.to_string(),
            })
    }

    /// Executes `name` with `params`.
    ///
    /// Appends one [`Observation`] to `log` for every outcome:
    /// - unknown tool → failed observation, [`ToolError::Unknown`];
    /// - schema violation → failed observation, [`ToolError::Validation`];
    /// - tool fault → failed observation, [`ToolError::Execution`];
    /// - success → successful observation with the result.
    pub fn execute(
        &self,
        name: &str,
        state: &WorkflowState,
        params: &Value,
        log: &mut Vec<Observation>,
    ) -> Result<Value, ToolError> {
        let def = match self.tools.get(name) {
            Some(def) => def,
            None => {
                let err = ToolError::Unknown {
                    name: name.to_string(),
                    available: self.names(),
                };
                log.push(Self::failed_observation(name, params, err.as_message()));
                return Err(err);
            }
        };

        if let Err(violation) = def.validator.validate(params) {
            let err = ToolError::Validation {
                name: name.to_string(),
                detail: violation.to_string(),
            };
            log.push(Self::failed_observation(name, params, err.as_message()));
            return Err(err);
        }

        match (def.func)(state, params) {
            Ok(result) => {
                log.push(Observation {
                    tool: name.to_string(),
                    args: params.clone(),
                    result: Some(result.clone()),
                    success: true,
                    error: None,
                    timestamp: Utc::now(),
                });
                Ok(result)
            }
            Err(detail) => {
                let err = ToolError::Execution {
                    name: name.to_string(),
                    detail,
                };
                log.push(Self::failed_observation(name, params, err.as_message()));
                Err(err)
            }
        }
    }

    fn failed_observation(name: &str, params: &Value, error: String) -> Observation {
        Observation {
            tool: name.to_string(),
            args: params.clone(),
            result: None,
            success: false,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_tool() -> ToolDef {
        ToolDef::new(
            "echo",
            "returns its message argument",
            serde_json::json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"],
            }),
            Arc::new(|_state, args| Ok(args["message"].clone())),
        )
        .unwrap()
    }

    fn faulty_tool() -> ToolDef {
        ToolDef::new(
            "faulty",
            "always fails",
            serde_json::json!({ "type": "object" }),
            Arc::new(|_state, _args| Err("内部错误".to_string())),
        )
        .unwrap()
    }

    #[test]
    fn successful_execution_appends_observation() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        let state = WorkflowState::new("q", 2);
        let mut log = Vec::new();

        let result = registry
            .execute("echo", &state, &serde_json::json!({"message": "hi"}), &mut log)
            .unwrap();
        assert_eq!(result, serde_json::json!("hi"));
        assert_eq!(log.len(), 1);
        assert!(log[0].success);
        assert_eq!(log[0].tool, "echo");
    }

    #[test]
    fn schema_violation_is_a_validation_error_with_observation() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        let state = WorkflowState::new("q", 2);
        let mut log = Vec::new();

        let err = registry
            .execute("echo", &state, &serde_json::json!({}), &mut log)
            .unwrap_err();
        assert_eq!(err.as_label(), "tool_validation_failed");
        assert_eq!(log.len(), 1);
        assert!(!log[0].success);
        assert!(log[0].result.is_none());
    }

    #[test]
    fn tool_fault_is_an_execution_error_with_observation() {
        let mut registry = ToolRegistry::new();
        registry.register(faulty_tool()).unwrap();
        let state = WorkflowState::new("q", 2);
        let mut log = Vec::new();

        let err = registry
            .execute("faulty", &state, &serde_json::json!({}), &mut log)
            .unwrap_err();
        assert_eq!(err.as_label(), "tool_execution_failed");
        assert!(!log[0].success);
        assert!(log[0].error.as_deref().unwrap().contains("内部错误"));
    }

    #[test]
    fn unknown_tool_lists_available_names() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        let state = WorkflowState::new("q", 2);
        let mut log = Vec::new();

        let err = registry
            .execute("missing", &state, &serde_json::json!({}), &mut log)
            .unwrap_err();
        assert!(err.as_message().contains("echo"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool()).unwrap();
        let err = registry.register(echo_tool()).unwrap_err();
        assert_eq!(err.as_label(), "tool_duplicate");
    }
}
