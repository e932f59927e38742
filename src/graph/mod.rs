//! The bounded-retry stage graph.

mod graph;

pub use graph::{GraphExit, Next, Routed, StageGraph, StageGraphBuilder, StagePoint};
