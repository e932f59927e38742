//! # Execution governor: budgets, modes, result synthesis.
//!
//! [`Governor`] owns one run end to end: it builds the execution context
//! and initial state, drives the stage graph, enforces the step/time/tool
//! budgets cooperatively at stage boundaries, publishes lifecycle events,
//! and synthesizes the [`ExecutionReport`] callers receive.
//!
//! ## Construction
//! A governor is built once from explicit parts — config, graph, pipeline
//! — and passed by handle; there is no ambient global instance. It is
//! `Clone` (the graph and pipeline are shared) and every run call is
//! independently concurrent-safe: runs share nothing mutable but the
//! pipeline's queue.
//!
//! ## Modes
//! - [`Governor::run`] — awaitable, one report per call.
//! - [`Governor::run_blocking`] — synchronous wrapper for non-async
//!   callers; builds a private current-thread runtime.
//! - [`Governor::run_streaming`] — yields one element per completed
//!   stage, then the final report.
//!
//! ## Timeout semantics
//! The wall-clock budget is checked **between** stages. A stage that
//! blocks past the budget is never interrupted mid-execution — the run is
//! marked `Timeout` at the next boundary. Killing a stage from outside
//! cannot guarantee a consistent state, so a stage that blocks forever
//! inside one call will hang its run; keep stage-internal I/O bounded.
//!
//! ## Failure semantics
//! Callers always receive a well-formed report, never an error: stage
//! faults are absorbed by the graph contract, budget hits and
//! infrastructure faults surface as report status plus
//! `error_type`/`error_message`.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::{Emitter, EventSource, EventType};
use crate::graph::{GraphExit, Next, StageGraph, StagePoint};
use crate::pipeline::EventPipeline;
use crate::state::WorkflowState;

use super::config::ExecConfig;
use super::context::{ExecStatus, ExecutionContext};
use super::result::ExecutionReport;
use super::runner::{StageStep, run_stage};
use super::stream::{ExecutionStream, StreamItem};

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The user query seeding the workflow state.
    pub query: String,
    /// External request correlation.
    pub request_id: Option<String>,
    /// User correlation.
    pub user_id: Option<String>,
    /// Pre-seeded state; when present its `user_query` wins over `query`.
    pub initial_state: Option<WorkflowState>,
}

impl RunRequest {
    /// A request for `query` with no correlation ids.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            request_id: None,
            user_id: None,
            initial_state: None,
        }
    }

    /// Attaches an external request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attaches a user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Seeds the run from an existing state instead of a fresh one.
    pub fn with_initial_state(mut self, state: WorkflowState) -> Self {
        self.initial_state = Some(state);
        self
    }
}

/// How the drive loop ended.
enum RunEnd {
    Accepted,
    RetryExhausted,
    Timeout(String),
    MaxSteps(String),
    MaxToolCalls(String),
    Fault(crate::error::GovernorError),
    ConsumerGone,
}

/// Orchestrates runs of one stage graph under budget enforcement.
#[derive(Clone)]
pub struct Governor {
    cfg: ExecConfig,
    graph: Arc<StageGraph>,
    pipeline: Arc<EventPipeline>,
}

impl Governor {
    /// Creates a governor from explicit parts.
    pub fn new(cfg: ExecConfig, graph: Arc<StageGraph>, pipeline: Arc<EventPipeline>) -> Self {
        Self {
            cfg,
            graph,
            pipeline,
        }
    }

    /// Runs one workflow to a terminal state and returns the report.
    pub async fn run(&self, request: RunRequest) -> ExecutionReport {
        self.drive(request, None).await
    }

    /// Blocking entry point for non-async callers.
    ///
    /// Builds a private current-thread runtime for the duration of the
    /// run. Must not be called from inside an async context; the pipeline
    /// may live on a different runtime — its queue does not care.
    pub fn run_blocking(&self, request: RunRequest) -> ExecutionReport {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = crate::error::GovernorError::Runtime {
                    message: e.to_string(),
                };
                return ExecutionReport::infrastructure_failure(
                    Uuid::new_v4().to_string(),
                    err.as_label(),
                    err.as_message(),
                );
            }
        };
        runtime.block_on(self.run(request))
    }

    /// Streaming entry point: yields `{node, delta}` after each stage,
    /// then the final report. Dropping the stream halts the run before
    /// the next stage boundary.
    pub fn run_streaming(&self, request: RunRequest) -> ExecutionStream {
        let (tx, rx) = mpsc::channel(1);
        let governor = self.clone();
        tokio::spawn(async move {
            let _ = governor.drive(request, Some(tx)).await;
        });
        ExecutionStream::new(rx)
    }

    /// The drive loop shared by all modes.
    async fn drive(
        &self,
        request: RunRequest,
        tap: Option<mpsc::Sender<StreamItem>>,
    ) -> ExecutionReport {
        let execution_id = Uuid::new_v4().to_string();
        let mut context = ExecutionContext::new(
            execution_id.clone(),
            request.request_id.clone(),
            request.user_id.clone(),
        );
        let scope = Emitter::new(
            Arc::clone(&self.pipeline),
            execution_id,
            request.request_id,
            request.user_id,
        );

        let mut state = request
            .initial_state
            .unwrap_or_else(|| WorkflowState::new(&request.query, self.cfg.max_retries));

        scope
            .emit(
                EventType::ExecutionStarted,
                EventSource::Executor,
                serde_json::json!({ "user_query": &state.user_query }),
            )
            .await;

        let mut point = self.graph.initial();
        let end = loop {
            // Cooperative budget checks, before each stage.
            if let Some(limit) = self.cfg.time_limit() {
                if context.elapsed() >= limit {
                    let reason = format!("执行超时: {}秒", limit.as_secs_f64());
                    scope
                        .emit(
                            EventType::TerminationTimeout,
                            EventSource::Executor,
                            serde_json::json!({ "max_execution_time": limit.as_secs_f64() }),
                        )
                        .await;
                    break RunEnd::Timeout(reason);
                }
            }
            if let Some(limit) = self.cfg.step_limit() {
                if context.steps_count >= limit {
                    let reason = format!("超过最大步数限制: {limit}");
                    scope
                        .emit(
                            EventType::TerminationMaxSteps,
                            EventSource::Executor,
                            serde_json::json!({ "max_steps": limit }),
                        )
                        .await;
                    break RunEnd::MaxSteps(reason);
                }
            }
            if let Some(limit) = self.cfg.tool_call_limit() {
                if state.tool_calls.len() as u32 >= limit {
                    let reason = format!("超过最大工具调用次数: {limit}");
                    scope
                        .emit(
                            EventType::TerminationMaxToolCalls,
                            EventSource::Executor,
                            serde_json::json!({ "max_tool_calls": limit }),
                        )
                        .await;
                    break RunEnd::MaxToolCalls(reason);
                }
            }

            if point == StagePoint::Plan {
                scope
                    .emit(
                        EventType::GraphLoopStarted,
                        EventSource::Graph,
                        serde_json::json!({ "pass": state.retries + 1 }),
                    )
                    .await;
            }

            let stage = self.graph.stage(point);
            let node = stage.name();
            context.record_step(node);

            let step = match run_stage(stage, &mut state, &scope).await {
                Ok(step) => step,
                Err(err) => {
                    context.record_error(err.as_label(), err.as_message(), Some(node.to_string()));
                    break RunEnd::Fault(err);
                }
            };
            if let StageStep::Faulted(fault) = &step {
                context.record_error(fault.kind, fault.message.clone(), Some(node.to_string()));
            }

            if let Some(tx) = &tap {
                let delta = match &step {
                    StageStep::Applied(update) => update.clone(),
                    StageStep::Faulted(_) => Default::default(),
                };
                let item = StreamItem::NodeExecution {
                    node: node.to_string(),
                    delta,
                };
                if tx.send(item).await.is_err() {
                    break RunEnd::ConsumerGone;
                }
            }

            if point == StagePoint::Critic {
                scope
                    .emit(
                        EventType::GraphLoopCompleted,
                        EventSource::Graph,
                        serde_json::json!({
                            "decision": state.critic_decision,
                            "reason": &state.critic_reason,
                            "retries": state.retries,
                        }),
                    )
                    .await;
            }

            let routed = self.graph.route(point, &state);
            scope
                .emit(
                    EventType::GraphRouteDecision,
                    EventSource::Graph,
                    serde_json::json!({ "from": node, "reason": routed.reason }),
                )
                .await;

            match routed.next {
                Next::Stage(next) => {
                    if point == StagePoint::Critic && next == StagePoint::Plan {
                        state.begin_retry_pass();
                    }
                    point = next;
                }
                Next::Done(GraphExit::Accepted) => break RunEnd::Accepted,
                Next::Done(GraphExit::Failed) => break RunEnd::RetryExhausted,
            }
        };

        self.finish(context, state, scope, end, tap).await
    }

    /// Emits the terminal events, finalizes the context, and synthesizes
    /// the report.
    async fn finish(
        &self,
        context: ExecutionContext,
        state: WorkflowState,
        scope: Emitter,
        end: RunEnd,
        tap: Option<mpsc::Sender<StreamItem>>,
    ) -> ExecutionReport {
        let elapsed = context.elapsed();
        let completed_payload = serde_json::json!({
            "duration": elapsed.as_secs_f64(),
            "steps_count": context.steps_count,
        });

        let (status, reason, error_type, error_message) = match end {
            RunEnd::Accepted => {
                scope
                    .emit(
                        EventType::ExecutionCompleted,
                        EventSource::Executor,
                        completed_payload,
                    )
                    .await;
                (ExecStatus::Success, None, None, None)
            }
            RunEnd::RetryExhausted => {
                let reason = state
                    .critic_reason
                    .clone()
                    .unwrap_or_else(|| "超出最大重试次数".to_string());
                scope
                    .emit(
                        EventType::TerminationMaxRetries,
                        EventSource::Executor,
                        serde_json::json!({ "max_retries": state.max_retries }),
                    )
                    .await;
                scope
                    .emit(
                        EventType::ExecutionCompleted,
                        EventSource::Executor,
                        completed_payload,
                    )
                    .await;
                (
                    ExecStatus::Failed,
                    Some(reason.clone()),
                    Some("retry_budget_exceeded".to_string()),
                    Some(reason),
                )
            }
            RunEnd::Timeout(reason) => {
                scope
                    .emit(
                        EventType::ExecutionTerminated,
                        EventSource::Executor,
                        serde_json::json!({ "reason": &reason }),
                    )
                    .await;
                (
                    ExecStatus::Timeout,
                    Some(reason.clone()),
                    Some("timeout".to_string()),
                    Some(reason),
                )
            }
            RunEnd::MaxSteps(reason) => {
                scope
                    .emit(
                        EventType::ExecutionTerminated,
                        EventSource::Executor,
                        serde_json::json!({ "reason": &reason }),
                    )
                    .await;
                (
                    ExecStatus::Terminated,
                    Some(reason.clone()),
                    Some("max_steps".to_string()),
                    Some(reason),
                )
            }
            RunEnd::MaxToolCalls(reason) => {
                scope
                    .emit(
                        EventType::ExecutionTerminated,
                        EventSource::Executor,
                        serde_json::json!({ "reason": &reason }),
                    )
                    .await;
                (
                    ExecStatus::Terminated,
                    Some(reason.clone()),
                    Some("max_tool_calls".to_string()),
                    Some(reason),
                )
            }
            RunEnd::Fault(err) => {
                let reason = err.as_message();
                scope
                    .emit(
                        EventType::ExecutionTerminated,
                        EventSource::Executor,
                        serde_json::json!({ "reason": &reason }),
                    )
                    .await;
                (
                    ExecStatus::Failed,
                    Some(reason.clone()),
                    Some(err.as_label().to_string()),
                    Some(reason),
                )
            }
            RunEnd::ConsumerGone => {
                let reason = "stream consumer dropped".to_string();
                scope
                    .emit(
                        EventType::ExecutionTerminated,
                        EventSource::Executor,
                        serde_json::json!({ "reason": &reason }),
                    )
                    .await;
                (ExecStatus::Terminated, Some(reason), None, None)
            }
        };

        if self.cfg.enable_trace {
            scope
                .emit(
                    EventType::StateSnapshot,
                    EventSource::Executor,
                    serde_json::json!({ "state": state.snapshot() }),
                )
                .await;
        }

        let context = context.finalize(status, reason);
        let report = ExecutionReport::from_parts(
            &context,
            &state,
            elapsed,
            self.cfg.enable_trace,
            error_type,
            error_message,
        );

        if let Some(tx) = tap {
            let _ = tx.send(StreamItem::Final(report.clone())).await;
        }
        report
    }
}
