//! Per-run event emission handle.

use std::sync::Arc;

use serde_json::Value;

use crate::pipeline::EventPipeline;

use super::{ErrorInfo, Event, EventSource, EventType};

/// Cheap-to-clone handle that stamps every event with one run's identity
/// before handing it to the shared [`EventPipeline`].
///
/// The governor builds one `Emitter` per run and passes it to the graph and
/// to every stage; stages use it for tool events and the graph for node and
/// routing events. Cloning shares the underlying pipeline.
#[derive(Clone)]
pub struct Emitter {
    pipeline: Arc<EventPipeline>,
    execution_id: Arc<str>,
    request_id: Option<Arc<str>>,
    user_id: Option<Arc<str>>,
}

impl Emitter {
    /// Creates an emitter for one run.
    pub fn new(
        pipeline: Arc<EventPipeline>,
        execution_id: impl Into<Arc<str>>,
        request_id: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            pipeline,
            execution_id: execution_id.into(),
            request_id: request_id.map(Into::into),
            user_id: user_id.map(Into::into),
        }
    }

    /// The run this emitter is bound to.
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Builds an event pre-stamped with this run's correlation fields.
    pub fn event(&self, event_type: EventType, source: EventSource) -> Event {
        let mut ev = Event::new(self.execution_id.as_ref(), event_type, source);
        if let Some(request_id) = &self.request_id {
            ev = ev.with_request_id(request_id.as_ref());
        }
        if let Some(user_id) = &self.user_id {
            ev = ev.with_user_id(user_id.as_ref());
        }
        ev
    }

    /// Hands a finished event to the pipeline.
    pub async fn send(&self, event: Event) {
        self.pipeline.emit(event).await;
    }

    /// Builds and sends in one step.
    pub async fn emit(&self, event_type: EventType, source: EventSource, payload: Value) {
        self.send(self.event(event_type, source).with_payload(payload))
            .await;
    }

    /// Builds and sends a node-scoped event.
    pub async fn emit_node(
        &self,
        event_type: EventType,
        node: &str,
        payload: Value,
    ) {
        self.send(
            self.event(event_type, EventSource::Node)
                .with_node(node)
                .with_payload(payload),
        )
        .await;
    }

    /// Builds and sends a failure event carrying fault details.
    pub async fn emit_error(
        &self,
        event_type: EventType,
        source: EventSource,
        info: ErrorInfo,
    ) {
        self.send(self.event(event_type, source).with_error_info(info))
            .await;
    }
}
