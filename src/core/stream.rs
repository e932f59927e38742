//! Streaming mode surface.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::state::StateUpdate;

use super::result::ExecutionReport;

/// One element of the incremental run output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamItem {
    /// A stage completed; `delta` is the partial update it produced
    /// (empty when the stage faulted and was absorbed).
    NodeExecution {
        /// The stage's node name.
        node: String,
        /// The update applied to the state.
        delta: StateUpdate,
    },
    /// Terminal element: the synthesized report.
    Final(ExecutionReport),
}

/// Finite, non-restartable sequence of stage outputs.
///
/// Yields one [`StreamItem::NodeExecution`] after each stage, then exactly
/// one [`StreamItem::Final`]. Dropping the stream halts further stage
/// invocation before the next stage boundary; effects of stages that
/// already ran are retained, nothing is rolled back.
pub struct ExecutionStream {
    rx: mpsc::Receiver<StreamItem>,
}

impl ExecutionStream {
    pub(crate) fn new(rx: mpsc::Receiver<StreamItem>) -> Self {
        Self { rx }
    }

    /// Receives the next element, or `None` once the run is over.
    pub async fn next(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }
}

impl Stream for ExecutionStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
