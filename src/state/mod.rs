//! Workflow state threaded through the stage graph.

mod state;
mod update;

pub use state::{CriticDecision, Observation, ToolCall, WorkflowState};
pub use update::StateUpdate;
