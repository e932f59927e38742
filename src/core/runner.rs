//! # Run a single stage at one boundary.
//!
//! Executes one stage, applies its update, and publishes the node's
//! lifecycle events.
//!
//! ## Outcome flow
//! ```text
//! stage.run() ─► Ok(update)      ─► apply ─► node.execution_completed + state.delta
//!             ─► Err(StageFault) ─► memory + clear outputs
//!                                   ─► node.execution_failed + exception.handled
//!             ─► panic           ─► exception.raised + node.execution_failed
//!                                   ─► GovernorError (run fails)
//! ```
//!
//! ## Rules
//! - A `StageFault` never aborts the run: the diagnostic lands in
//!   `memory["{node}_error"]`, the node's output fields are reset, and the
//!   governor keeps driving — the critic reacts to the hole it left.
//! - Only a panic escapes, as [`GovernorError::StagePanic`].

use futures::FutureExt;

use crate::error::{GovernorError, StageFault};
use crate::events::{Emitter, ErrorInfo, EventSource, EventType};
use crate::pipeline::panic_message;
use crate::stages::Stage;
use crate::state::{StateUpdate, WorkflowState};

/// What one stage boundary produced.
pub enum StageStep {
    /// The stage completed; its update has been applied.
    Applied(StateUpdate),
    /// The stage faulted; the diagnostic has been absorbed.
    Faulted(StageFault),
}

/// Executes one stage over `state`, publishing lifecycle events to the
/// run's scope.
pub async fn run_stage(
    stage: &dyn Stage,
    state: &mut WorkflowState,
    scope: &Emitter,
) -> Result<StageStep, GovernorError> {
    let node = stage.name();

    scope
        .emit_node(EventType::NodeExecutionStarted, node, serde_json::json!({}))
        .await;

    let outcome = std::panic::AssertUnwindSafe(stage.run(state, scope))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(update)) => {
            state.apply(update.clone());
            scope
                .emit_node(
                    EventType::NodeExecutionCompleted,
                    node,
                    serde_json::json!({}),
                )
                .await;
            let delta = serde_json::to_value(&update).unwrap_or(serde_json::Value::Null);
            scope
                .emit_node(
                    EventType::StateDelta,
                    node,
                    serde_json::json!({ "delta": delta }),
                )
                .await;
            Ok(StageStep::Applied(update))
        }
        Ok(Err(fault)) => {
            state.record_fault(node, &fault.message);
            state.clear_outputs_of(node);
            scope
                .send(
                    scope
                        .event(EventType::NodeExecutionFailed, EventSource::Node)
                        .with_node(node)
                        .with_error_info(ErrorInfo::new(fault.kind, fault.message.clone())),
                )
                .await;
            scope
                .send(
                    scope
                        .event(EventType::ExceptionHandled, EventSource::Node)
                        .with_node(node)
                        .with_error_info(ErrorInfo::new(fault.kind, fault.message.clone())),
                )
                .await;
            Ok(StageStep::Faulted(fault))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            scope
                .send(
                    scope
                        .event(EventType::ExceptionRaised, EventSource::Node)
                        .with_node(node)
                        .with_error_info(ErrorInfo::new("stage_panic", message.clone())),
                )
                .await;
            scope
                .send(
                    scope
                        .event(EventType::NodeExecutionFailed, EventSource::Node)
                        .with_node(node)
                        .with_error_info(ErrorInfo::new("stage_panic", message.clone())),
                )
                .await;
            Err(GovernorError::StagePanic {
                node: node.to_string(),
                message,
            })
        }
    }
}
