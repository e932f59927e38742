//! # Core sink trait
//!
//! `Sink` is the extension point for plugging storage adapters into the
//! pipeline. Each sink receives events from the single dispatcher task in
//! receipt order; per-execution ordering is preserved for it by the queue.
//!
//! ## Contract
//! - `write`/`write_async` report failure by returning `false`, never by
//!   raising; unexpected panics are caught by the dispatcher and logged to
//!   the fallback channel.
//! - A failing sink never halts dispatch to the remaining sinks and never
//!   reaches producers.
//! - Implementations may be slow (I/O, batching) — they delay the shared
//!   dispatcher, not the producers, unless the queue backs up far enough
//!   to trigger the producer's bounded wait.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event storage adapters.
///
/// Called from the pipeline's dispatcher task. Implementations backed by
/// synchronous I/O only implement [`Sink::write`]; adapters with real
/// async I/O override [`Sink::write_async`].
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Human-readable name (for the fallback channel).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Writes one event. Returns `false` on failure, never raises.
    fn write(&self, event: &Event) -> bool;

    /// Async write. Defaults to the synchronous path.
    async fn write_async(&self, event: &Event) -> bool {
        self.write(event)
    }

    /// Forces buffered output to persist. Returns `false` on failure.
    fn flush(&self) -> bool {
        true
    }

    /// Async flush. Defaults to the synchronous path.
    async fn flush_async(&self) -> bool {
        self.flush()
    }
}
