//! # Stage graph: fixed topology with one bounded feedback loop.
//!
//! ```text
//!                                      ┌────────────┐
//!                                      ▼            │ retry
//! INTENT ──► PLAN ──► RETRIEVAL_DECISION            │ (retries ≤ max)
//!                        │         │                │
//!             need=true  │         │ need=false     │
//!                        ▼         │                │
//!                    RETRIEVAL     │                │
//!                        │         │                │
//!                        ▼         ▼                │
//!                       DRAFT ◄────┘                │
//!                        │                          │
//!                        ▼                          │
//!                      CRITIC ──────────────────────┘
//!                        │
//!                        ▼
//!              DONE (accepted / failed)
//! ```
//!
//! ## Routing rules
//! - `RETRIEVAL_DECISION → RETRIEVAL` iff `need_retrieval = true`, else
//!   directly to `DRAFT` — a skipped retrieval is not a failure.
//! - `CRITIC → DONE/ACCEPTED` iff the decision is `Accept`.
//! - `CRITIC → PLAN` iff the decision is `Retry` and `retries ≤
//!   max_retries`; the loop re-enters planning with prior `tool_calls` and
//!   `memory` intact — context is never discarded on retry.
//! - `CRITIC → DONE/FAILED` once `retries > max_retries`.
//! - An absent decision routes like `Retry` (fail-open toward another
//!   attempt rather than silently accepting).
//!
//! The graph owns topology and routing only; budget enforcement and event
//! emission around each stage belong to the governor driving it.

use std::sync::Arc;

use crate::stages::{
    CriticStage, DraftAnswerStage, IntentRouterStage, MemoryRetriever, PlannerStage,
    RetrievalDecisionStage, RetrievalStage, Retriever, Stage, StageRef, ToolExecutor,
};
use crate::state::{CriticDecision, WorkflowState};
use crate::tools::ToolRegistry;

/// Default document cap for the retrieval branch.
const DEFAULT_TOP_K: usize = 5;

/// Position in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePoint {
    /// Intent classification.
    Intent,
    /// Planning (loop re-entry point).
    Plan,
    /// Retrieval gating.
    RetrievalDecision,
    /// Document retrieval (conditional branch).
    Retrieval,
    /// Tool execution + draft synthesis.
    Draft,
    /// The critic checkpoint.
    Critic,
}

/// How a run left the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphExit {
    /// The critic accepted a draft.
    Accepted,
    /// The retry budget was exhausted.
    Failed,
}

/// Where routing sends execution next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Another stage.
    Stage(StagePoint),
    /// A terminal state.
    Done(GraphExit),
}

/// A routing decision plus the reason it was taken (route events).
#[derive(Debug, Clone)]
pub struct Routed {
    /// The destination.
    pub next: Next,
    /// Short reason string for the audit trail.
    pub reason: String,
}

/// The fixed stage topology of one workflow.
///
/// Holds one stage per node; every slot can be swapped through the
/// [`StageGraphBuilder`]. Shared across concurrent runs behind an `Arc` —
/// stages are stateless with respect to any single run.
pub struct StageGraph {
    intent: StageRef,
    planner: StageRef,
    retrieval_decision: StageRef,
    retrieval: StageRef,
    draft: StageRef,
    critic: StageRef,
}

impl StageGraph {
    /// Starts a builder with no stages wired.
    pub fn builder() -> StageGraphBuilder {
        StageGraphBuilder::default()
    }

    /// The default wiring: built-in stages over the given tool registry
    /// and retriever.
    pub fn with_defaults(registry: Arc<ToolRegistry>, retriever: Arc<dyn Retriever>) -> Self {
        StageGraphBuilder::default().build(registry, retriever)
    }

    /// The entry node.
    pub fn initial(&self) -> StagePoint {
        StagePoint::Intent
    }

    /// The stage wired at `point`.
    pub fn stage(&self, point: StagePoint) -> &dyn Stage {
        match point {
            StagePoint::Intent => self.intent.as_ref(),
            StagePoint::Plan => self.planner.as_ref(),
            StagePoint::RetrievalDecision => self.retrieval_decision.as_ref(),
            StagePoint::Retrieval => self.retrieval.as_ref(),
            StagePoint::Draft => self.draft.as_ref(),
            StagePoint::Critic => self.critic.as_ref(),
        }
    }

    /// Routes execution after `point` completed over `state`.
    pub fn route(&self, point: StagePoint, state: &WorkflowState) -> Routed {
        match point {
            StagePoint::Intent => Routed {
                next: Next::Stage(StagePoint::Plan),
                reason: "intent classified".to_string(),
            },
            StagePoint::Plan => Routed {
                next: Next::Stage(StagePoint::RetrievalDecision),
                reason: "plan ready".to_string(),
            },
            StagePoint::RetrievalDecision => {
                if state.need_retrieval == Some(true) {
                    Routed {
                        next: Next::Stage(StagePoint::Retrieval),
                        reason: "need_retrieval=true".to_string(),
                    }
                } else {
                    // false or undecided: skip the branch, never fail it.
                    Routed {
                        next: Next::Stage(StagePoint::Draft),
                        reason: "need_retrieval=false".to_string(),
                    }
                }
            }
            StagePoint::Retrieval => Routed {
                next: Next::Stage(StagePoint::Draft),
                reason: "documents retrieved".to_string(),
            },
            StagePoint::Draft => Routed {
                next: Next::Stage(StagePoint::Critic),
                reason: "draft ready".to_string(),
            },
            StagePoint::Critic => self.route_after_critic(state),
        }
    }

    fn route_after_critic(&self, state: &WorkflowState) -> Routed {
        match state.critic_decision {
            Some(CriticDecision::Accept) => Routed {
                next: Next::Done(GraphExit::Accepted),
                reason: "critic_decision=accept".to_string(),
            },
            Some(CriticDecision::Fail) => Routed {
                next: Next::Done(GraphExit::Failed),
                reason: "critic_decision=fail".to_string(),
            },
            // Retry, or no recognizable decision: fail open toward
            // another attempt — but only inside the budget.
            Some(CriticDecision::Retry) | None => {
                if state.retries <= state.max_retries {
                    Routed {
                        next: Next::Stage(StagePoint::Plan),
                        reason: format!(
                            "critic_decision=retry ({}/{})",
                            state.retries, state.max_retries
                        ),
                    }
                } else {
                    Routed {
                        next: Next::Done(GraphExit::Failed),
                        reason: "retries exceeded max_retries".to_string(),
                    }
                }
            }
        }
    }
}

/// Builder that fills unwired slots with the built-in stages.
#[derive(Default)]
pub struct StageGraphBuilder {
    intent: Option<StageRef>,
    planner: Option<StageRef>,
    retrieval_decision: Option<StageRef>,
    retrieval: Option<StageRef>,
    draft: Option<StageRef>,
    critic: Option<StageRef>,
}

impl StageGraphBuilder {
    /// Wires the intent node.
    pub fn with_intent(mut self, stage: impl Stage) -> Self {
        self.intent = Some(Arc::new(stage));
        self
    }

    /// Wires the planner node.
    pub fn with_planner(mut self, stage: impl Stage) -> Self {
        self.planner = Some(Arc::new(stage));
        self
    }

    /// Wires the retrieval-decision node.
    pub fn with_retrieval_decision(mut self, stage: impl Stage) -> Self {
        self.retrieval_decision = Some(Arc::new(stage));
        self
    }

    /// Wires the retrieval node.
    pub fn with_retrieval(mut self, stage: impl Stage) -> Self {
        self.retrieval = Some(Arc::new(stage));
        self
    }

    /// Wires the draft-synthesis node.
    pub fn with_draft(mut self, stage: impl Stage) -> Self {
        self.draft = Some(Arc::new(stage));
        self
    }

    /// Wires the critic node.
    pub fn with_critic(mut self, stage: impl Stage) -> Self {
        self.critic = Some(Arc::new(stage));
        self
    }

    /// Builds the graph, filling unwired slots with the built-in stages
    /// over `registry` and `retriever`.
    pub fn build(self, registry: Arc<ToolRegistry>, retriever: Arc<dyn Retriever>) -> StageGraph {
        StageGraph {
            intent: self.intent.unwrap_or_else(|| Arc::new(IntentRouterStage::new())),
            planner: self.planner.unwrap_or_else(|| Arc::new(PlannerStage::new())),
            retrieval_decision: self
                .retrieval_decision
                .unwrap_or_else(|| Arc::new(RetrievalDecisionStage::new())),
            retrieval: self
                .retrieval
                .unwrap_or_else(|| Arc::new(RetrievalStage::new(retriever, DEFAULT_TOP_K))),
            draft: self
                .draft
                .unwrap_or_else(|| Arc::new(DraftAnswerStage::new(ToolExecutor::new(registry)))),
            critic: self.critic.unwrap_or_else(|| Arc::new(CriticStage::new())),
        }
    }
}

impl Default for StageGraph {
    /// Built-in stages over the built-in tools and an empty retriever.
    fn default() -> Self {
        Self::with_defaults(
            Arc::new(crate::tools::builtin_registry()),
            Arc::new(MemoryRetriever::empty()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> StageGraph {
        StageGraph::default()
    }

    fn state() -> WorkflowState {
        WorkflowState::new("q", 2)
    }

    #[test]
    fn retrieval_branch_is_taken_only_when_needed() {
        let graph = graph();
        let mut s = state();

        s.need_retrieval = Some(true);
        assert_eq!(
            graph.route(StagePoint::RetrievalDecision, &s).next,
            Next::Stage(StagePoint::Retrieval)
        );

        s.need_retrieval = Some(false);
        assert_eq!(
            graph.route(StagePoint::RetrievalDecision, &s).next,
            Next::Stage(StagePoint::Draft)
        );

        // Undecided skips too: absence of retrieval is not a failure.
        s.need_retrieval = None;
        assert_eq!(
            graph.route(StagePoint::RetrievalDecision, &s).next,
            Next::Stage(StagePoint::Draft)
        );
    }

    #[test]
    fn accept_ends_the_run() {
        let graph = graph();
        let mut s = state();
        s.critic_decision = Some(CriticDecision::Accept);
        assert_eq!(
            graph.route(StagePoint::Critic, &s).next,
            Next::Done(GraphExit::Accepted)
        );
    }

    #[test]
    fn retry_within_budget_re_enters_planning() {
        let graph = graph();
        let mut s = state();
        s.critic_decision = Some(CriticDecision::Retry);
        s.retries = 2; // == max_retries
        assert_eq!(
            graph.route(StagePoint::Critic, &s).next,
            Next::Stage(StagePoint::Plan)
        );
    }

    #[test]
    fn missing_decision_fails_open_to_retry() {
        let graph = graph();
        let s = state();
        assert_eq!(
            graph.route(StagePoint::Critic, &s).next,
            Next::Stage(StagePoint::Plan)
        );
    }

    #[test]
    fn exhausted_budget_fails_the_run() {
        let graph = graph();
        let mut s = state();
        s.critic_decision = Some(CriticDecision::Fail);
        assert_eq!(
            graph.route(StagePoint::Critic, &s).next,
            Next::Done(GraphExit::Failed)
        );

        // Defensive guard: a Retry decision past the budget is terminal too.
        s.critic_decision = Some(CriticDecision::Retry);
        s.retries = 3;
        assert_eq!(
            graph.route(StagePoint::Critic, &s).next,
            Next::Done(GraphExit::Failed)
        );
    }

    #[test]
    fn linear_edges_are_fixed() {
        let graph = graph();
        let s = state();
        assert_eq!(
            graph.route(StagePoint::Intent, &s).next,
            Next::Stage(StagePoint::Plan)
        );
        assert_eq!(
            graph.route(StagePoint::Plan, &s).next,
            Next::Stage(StagePoint::RetrievalDecision)
        );
        assert_eq!(
            graph.route(StagePoint::Retrieval, &s).next,
            Next::Stage(StagePoint::Draft)
        );
        assert_eq!(
            graph.route(StagePoint::Draft, &s).next,
            Next::Stage(StagePoint::Critic)
        );
    }
}
