//! Simple stdout sink for debugging and demos.
//!
//! Output format:
//! ```text
//! [2026-08-05T10:22:31.104Z] node.execution_completed | node | 0b2e…  node=planner
//! ```

use crate::events::Event;

use super::Sink;

/// Human-readable stdout sink.
///
/// Intended for development and demos; implement a custom [`Sink`] for
/// structured storage.
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn write(&self, event: &Event) -> bool {
        let mut line = format!(
            "[{}] {} | {} | {}",
            event.timestamp.to_rfc3339(),
            event.event_type.as_str(),
            event.source,
            event.execution_id,
        );
        if let Some(node) = &event.node_name {
            line.push_str(&format!("  node={node}"));
        }
        if let Some(tool) = &event.tool_name {
            line.push_str(&format!("  tool={tool}"));
        }
        println!("{line}");
        if !event.payload.is_null() {
            println!("  payload: {}", event.payload);
        }
        if let Some(info) = &event.error_info {
            println!("  error: {}: {}", info.kind, info.message);
        }
        true
    }
}
