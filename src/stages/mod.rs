//! Stage trait and the default stage collaborators.
//!
//! Stages are the pluggable units of the workflow: pure functions from
//! the current [`WorkflowState`](crate::state::WorkflowState) to a partial
//! update. The graph invokes them opaquely; everything in this module can
//! be swapped for application-specific implementations (LLM-backed
//! classification, a real vector store) without touching the core.

mod critic;
mod draft;
mod intent;
mod planner;
mod retrieval;
mod retrieval_decision;
mod stage;
mod tool_exec;

pub use critic::CriticStage;
pub use draft::DraftAnswerStage;
pub use intent::IntentRouterStage;
pub use planner::PlannerStage;
pub use retrieval::{MemoryRetriever, RetrievalStage, Retriever};
pub use retrieval_decision::RetrievalDecisionStage;
pub use stage::{Stage, StageRef};
pub use tool_exec::ToolExecutor;
