//! # agentvisor
//!
//! **Agentvisor** is a governed execution runtime for multi-stage agent
//! workflows.
//!
//! It drives an ordered sequence of processing stages with one bounded
//! feedback loop (a critic checkpoint that may send execution back to
//! re-planning), enforces step-count and wall-clock budgets across three
//! invocation modes, and captures a complete, ordered, non-blocking audit
//! trail of everything that happened during a run.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     caller ──► Governor::run / run_blocking / run_streaming
//!                     │
//!                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Governor (one run)                                               │
//! │  - ExecutionContext (steps, timing, node order, faults)           │
//! │  - cooperative budget checks at every stage boundary              │
//! │  - ExecutionReport synthesis (defensive extraction)               │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//!   StageGraph:  INTENT ─► PLAN ─► RETRIEVAL_DECISION ─► (RETRIEVAL) ─► DRAFT ─► CRITIC
//!                           ▲                                                      │
//!                           └────────────── retry (retries ≤ max) ◄────────────────┘
//!        │
//!        │ Events: execution.* / graph.* / node.* / tool.* / state.*
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │               EventPipeline (bounded queue, one dispatcher)       │
//! │    batch by size or interval ──► sink 1, sink 2, ... (isolated)   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle of one run
//! ```text
//! RunRequest ──► Governor ──► initial WorkflowState
//!
//! loop {
//!   ├─► check wall-clock budget   ─► Timeout (between stages only)
//!   ├─► check step budget         ─► Terminated
//!   ├─► run stage
//!   │     ├─ Ok(update)        ─► apply, emit node events
//!   │     └─ Err(StageFault)   ─► absorb into memory, continue
//!   └─► route
//!         ├─ next stage         ─► continue
//!         ├─ DONE/ACCEPTED      ─► Success
//!         └─ DONE/FAILED        ─► Failed (deterministic message)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                   |
//! |-------------------|--------------------------------------------------------------------|--------------------------------------|
//! | **Execution**     | Budgets, modes, result synthesis for one run.                      | [`Governor`], [`ExecConfig`]         |
//! | **Stage graph**   | Fixed topology with one bounded feedback loop.                     | [`StageGraph`], [`Stage`]            |
//! | **Observability** | Bounded, zero-loss event distribution with pluggable sinks.        | [`EventPipeline`], [`Sink`]          |
//! | **State**         | Typed workflow state with explicit partial updates.                | [`WorkflowState`], [`StateUpdate`]   |
//! | **Tools**         | Schema-validated tool invocation with an observation trace.        | [`tools::ToolRegistry`]              |
//! | **Errors**        | Typed faults for runtime, stages, and tools.                       | [`GovernorError`], [`ToolError`]     |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use agentvisor::sinks::{ConsoleSink, Sink};
//! use agentvisor::stages::MemoryRetriever;
//! use agentvisor::tools::builtin_registry;
//! use agentvisor::{EventPipeline, ExecConfig, Governor, RunRequest, StageGraph};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Constructed once, passed by handle — no ambient globals.
//!     let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(ConsoleSink)];
//!     let pipeline = Arc::new(EventPipeline::with_sinks(sinks));
//!
//!     let graph = Arc::new(StageGraph::with_defaults(
//!         Arc::new(builtin_registry()),
//!         Arc::new(MemoryRetriever::new(vec![
//!             "向量数据库通过相似度检索文档".to_string(),
//!         ])),
//!     ));
//!     let governor = Governor::new(ExecConfig::default(), graph, Arc::clone(&pipeline));
//!
//!     let report = governor
//!         .run(RunRequest::new("帮我调用天气查询工具，城市=北京"))
//!         .await;
//!     println!("[{}] {}", report.status.as_str(), report.answer.unwrap_or_default());
//!
//!     pipeline.shutdown().await;
//! }
//! ```
//!
//! ## Timeout semantics
//! The wall-clock budget is **cooperative**: it is checked before each
//! stage starts, and a stage is never interrupted mid-execution. A stage
//! that blocks indefinitely inside one call therefore hangs its run; keep
//! stage-internal I/O bounded. (A preemptive, mid-stage kill cannot
//! guarantee a consistent state across concurrent runs and is deliberately
//! not offered.)

mod core;
pub mod error;
pub mod events;
pub mod graph;
pub mod pipeline;
pub mod sinks;
pub mod stages;
pub mod state;
pub mod tools;

// ---- Public re-exports ----

pub use core::{
    ExecConfig, ExecStatus, ExecutionContext, ExecutionReport, ExecutionStream, FaultRecord,
    Governor, RunRequest, StreamItem,
};
pub use error::{GovernorError, StageFault, ToolError};
pub use events::{Emitter, ErrorInfo, Event, EventSource, EventType};
pub use graph::{StageGraph, StageGraphBuilder};
pub use pipeline::{EventPipeline, PipelineConfig};
pub use sinks::Sink;
pub use stages::{Retriever, Stage};
pub use state::{CriticDecision, StateUpdate, WorkflowState};
