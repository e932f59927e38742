//! # Stage abstraction.
//!
//! A stage reads the workflow state and returns an explicit
//! [`StateUpdate`] or a recoverable [`StageFault`]. Faults never abort the
//! run: the graph records the diagnostic into `memory`, clears the stage's
//! output fields, and proceeds — the critic's checks then decide between
//! retry and terminal failure. Panicking is *not* part of the contract;
//! a panic is treated as an infrastructure fault and fails the run.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StageFault;
use crate::events::Emitter;
use crate::state::{StateUpdate, WorkflowState};

/// # One unit of the workflow.
///
/// A `Stage` has a stable [`name`](Stage::name) (the graph's node name,
/// recorded in the execution order and on node events) and an async
/// [`run`](Stage::run) over the current state. The [`Emitter`] is the
/// run-scoped audit handle; stages that invoke tools use it to publish
/// tool events.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use agentvisor::error::StageFault;
/// use agentvisor::events::Emitter;
/// use agentvisor::stages::Stage;
/// use agentvisor::state::{StateUpdate, WorkflowState};
///
/// struct FixedIntent;
///
/// #[async_trait]
/// impl Stage for FixedIntent {
///     fn name(&self) -> &'static str { "intent_router" }
///
///     async fn run(
///         &self,
///         _state: &WorkflowState,
///         _scope: &Emitter,
///     ) -> Result<StateUpdate, StageFault> {
///         Ok(StateUpdate::intent("qa"))
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Returns the stable node name of this stage.
    fn name(&self) -> &'static str;

    /// Executes the stage over the current state.
    ///
    /// Business-level failures must be returned as `Err(StageFault)` or
    /// captured into the update's `memory` entries — never panicked.
    async fn run(
        &self,
        state: &WorkflowState,
        scope: &Emitter,
    ) -> Result<StateUpdate, StageFault>;
}

/// Shared handle to a stage.
pub type StageRef = Arc<dyn Stage>;
