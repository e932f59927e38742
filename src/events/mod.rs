//! Structured events emitted by the governor, graph, stages, and tools.

mod emitter;
mod event;

pub use emitter::Emitter;
pub use event::{ErrorInfo, Event, EventSource, EventType};
