//! # Event pipeline: bounded queue, batched dispatch, zero loss.
//!
//! [`EventPipeline`] accepts [`Event`]s from any number of concurrent runs
//! and distributes them to the configured [`Sink`]s without blocking
//! producers beyond a short bounded wait, and without ever dropping an
//! event.
//!
//! ## Architecture
//! ```text
//! Producers (many):                  Dispatcher (one):
//!   Governor A ──┐
//!   Stages A   ──┤
//!   Governor B ──┼──► bounded mpsc ──► dispatch loop ──► batch ──┬─► sink 1
//!   Stages B   ──┤       queue          (single task)            ├─► sink 2
//!   Tools ...  ──┘                                               └─► sink N
//! ```
//!
//! The dispatcher accumulates a batch and flushes it when either the batch
//! reaches [`PipelineConfig::batch_size`] or
//! [`PipelineConfig::flush_interval`] elapses, whichever comes first. Each
//! flush writes the batch, in receipt order, to every sink in turn.
//!
//! ## Backpressure
//! `emit` never drops. The fast path is a non-blocking `try_send`; on a
//! full queue the producer waits up to [`PipelineConfig::enqueue_wait`]
//! for the dispatcher to drain; if the queue is *still* full, the producer
//! writes that event directly to all sinks itself, bypassing the queue.
//! The degraded path trades the per-execution ordering guarantee for zero
//! loss (a direct write may overtake still-queued older events) and is
//! reported on the fallback channel; it is only reachable when the
//! dispatcher cannot drain within the bounded wait.
//!
//! ## Sink isolation
//! Sink writes are wrapped in `catch_unwind`: a panicking or failing sink
//! is reported via `tracing` and never halts dispatch to the remaining
//! sinks, the remaining batches, or the producers.
//!
//! ## Ordering
//! Events of one `execution_id` reach each sink in non-decreasing `seq`
//! order on the queued path: producers enqueue into a single FIFO and one
//! dispatcher writes in receipt order. Nothing is guaranteed across
//! different executions.
//!
//! ## Shutdown
//! [`EventPipeline::flush`] pushes an acked control message through the
//! same FIFO, so everything enqueued before it is on disk when it returns.
//! [`EventPipeline::shutdown`] stops accepting submissions, drains the
//! remaining events, flushes sinks, and stops the dispatcher. Both are
//! idempotent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::events::Event;
use crate::sinks::Sink;

/// Tuning knobs for the pipeline.
///
/// ## Field semantics
/// - `queue_capacity`: bound of the submission queue (min 1; clamped).
/// - `batch_size`: dispatcher flushes when this many events accumulate
///   (min 1; clamped).
/// - `flush_interval`: dispatcher flushes a non-empty batch at least this
///   often.
/// - `enqueue_wait`: how long a producer blocks on a full queue before
///   falling back to a direct write.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Bound of the submission queue.
    pub queue_capacity: usize,
    /// Batch threshold for dispatch.
    pub batch_size: usize,
    /// Time threshold for dispatch.
    pub flush_interval: Duration,
    /// Bounded wait before the direct-write fallback.
    pub enqueue_wait: Duration,
}

impl Default for PipelineConfig {
    /// Defaults:
    /// - `queue_capacity = 1024`
    /// - `batch_size = 64`
    /// - `flush_interval = 1s`
    /// - `enqueue_wait = 25ms`
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            batch_size: 64,
            flush_interval: Duration::from_secs(1),
            enqueue_wait: Duration::from_millis(25),
        }
    }
}

impl PipelineConfig {
    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Batch size clamped to a minimum of 1.
    #[inline]
    pub fn batch_size_clamped(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Messages flowing through the submission queue.
///
/// Control messages travel the same FIFO as events so that an ack implies
/// everything enqueued before it has been written.
enum Envelope {
    Record(Event),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Shared, non-blocking event distribution for any number of runs.
///
/// Construct once (inside a running Tokio runtime — construction spawns
/// the dispatcher task), wrap in an `Arc`, and hand the handle to every
/// governor. Cloning the `Arc` is the sharing mechanism; the pipeline
/// itself is not `Clone`.
pub struct EventPipeline {
    tx: mpsc::Sender<Envelope>,
    sinks: Arc<Vec<Arc<dyn Sink>>>,
    cfg: PipelineConfig,
    accepting: AtomicBool,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventPipeline {
    /// Creates a pipeline and spawns its dispatcher task.
    ///
    /// Must be called within a Tokio runtime; the dispatcher lives on the
    /// runtime that constructed the pipeline.
    pub fn new(cfg: PipelineConfig, sinks: Vec<Arc<dyn Sink>>) -> Self {
        let (tx, rx) = mpsc::channel(cfg.queue_capacity_clamped());
        let sinks = Arc::new(sinks);
        let handle = tokio::spawn(dispatch_loop(
            rx,
            Arc::clone(&sinks),
            cfg.batch_size_clamped(),
            cfg.flush_interval,
        ));
        Self {
            tx,
            sinks,
            cfg,
            accepting: AtomicBool::new(true),
            dispatcher: Mutex::new(Some(handle)),
        }
    }

    /// Creates a pipeline with default tuning.
    pub fn with_sinks(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self::new(PipelineConfig::default(), sinks)
    }

    /// Submits one event.
    ///
    /// Returns `true` when the event was handed over (enqueued or written
    /// directly), `false` only when the pipeline has been shut down and
    /// refuses new submissions.
    pub async fn emit(&self, event: Event) -> bool {
        if !self.accepting.load(AtomicOrdering::SeqCst) {
            tracing::warn!(
                execution_id = %event.execution_id,
                event_type = event.event_type.as_str(),
                "event refused: pipeline is shut down"
            );
            return false;
        }

        let envelope = match self.tx.try_send(Envelope::Record(event)) {
            Ok(()) => return true,
            Err(TrySendError::Full(envelope)) => envelope,
            Err(TrySendError::Closed(envelope)) => {
                self.write_direct(envelope).await;
                return true;
            }
        };

        // Queue full: wait briefly for the dispatcher to drain.
        match self.tx.send_timeout(envelope, self.cfg.enqueue_wait).await {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(envelope))
            | Err(SendTimeoutError::Closed(envelope)) => {
                tracing::warn!(
                    wait = ?self.cfg.enqueue_wait,
                    "event queue saturated; writing directly to sinks"
                );
                self.write_direct(envelope).await;
                true
            }
        }
    }

    /// Synchronously drains everything enqueued so far and forces each
    /// sink to persist buffered output. Idempotent.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Envelope::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        } else {
            // Dispatcher already gone; sinks may still buffer.
            flush_sinks(&self.sinks).await;
        }
    }

    /// Stops accepting submissions, drains remaining events, flushes
    /// sinks, then stops the dispatcher. Idempotent.
    pub async fn shutdown(&self) {
        self.accepting.store(false, AtomicOrdering::SeqCst);

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Envelope::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }

        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Degraded path: the producer writes to all sinks itself.
    async fn write_direct(&self, envelope: Envelope) {
        match envelope {
            Envelope::Record(event) => write_event(&self.sinks, &event).await,
            // Control messages only originate from flush/shutdown, which
            // use `send`, not the degraded path.
            Envelope::Flush(ack) | Envelope::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// The single background dispatcher shared by all runs.
async fn dispatch_loop(
    mut rx: mpsc::Receiver<Envelope>,
    sinks: Arc<Vec<Arc<dyn Sink>>>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch: Vec<Event> = Vec::with_capacity(batch_size);
    let mut ticker = time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(Envelope::Record(event)) => {
                    batch.push(event);
                    if batch.len() >= batch_size {
                        write_batch(&sinks, &mut batch).await;
                    }
                }
                Some(Envelope::Flush(ack)) => {
                    write_batch(&sinks, &mut batch).await;
                    flush_sinks(&sinks).await;
                    let _ = ack.send(());
                }
                Some(Envelope::Shutdown(ack)) => {
                    drain_remaining(&mut rx, &mut batch);
                    write_batch(&sinks, &mut batch).await;
                    flush_sinks(&sinks).await;
                    let _ = ack.send(());
                    break;
                }
                None => {
                    write_batch(&sinks, &mut batch).await;
                    flush_sinks(&sinks).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    write_batch(&sinks, &mut batch).await;
                }
            }
        }
    }
}

/// Pulls everything still queued behind a shutdown message.
fn drain_remaining(rx: &mut mpsc::Receiver<Envelope>, batch: &mut Vec<Event>) {
    while let Ok(envelope) = rx.try_recv() {
        match envelope {
            Envelope::Record(event) => batch.push(event),
            Envelope::Flush(ack) | Envelope::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// Writes a batch in receipt order to every sink in turn.
async fn write_batch(sinks: &[Arc<dyn Sink>], batch: &mut Vec<Event>) {
    for event in batch.drain(..) {
        write_event(sinks, &event).await;
    }
}

/// Writes one event to every sink, isolating failures and panics.
async fn write_event(sinks: &[Arc<dyn Sink>], event: &Event) {
    for sink in sinks {
        let write = std::panic::AssertUnwindSafe(sink.write_async(event));
        match write.catch_unwind().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    sink = sink.name(),
                    execution_id = %event.execution_id,
                    event_type = event.event_type.as_str(),
                    "sink reported write failure"
                );
            }
            Err(panic) => {
                tracing::error!(
                    sink = sink.name(),
                    panic = %panic_message(panic.as_ref()),
                    "sink panicked during write"
                );
            }
        }
    }
}

/// Flushes every sink, isolating failures and panics.
async fn flush_sinks(sinks: &[Arc<dyn Sink>]) {
    for sink in sinks {
        let flush = std::panic::AssertUnwindSafe(sink.flush_async());
        match flush.catch_unwind().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(sink = sink.name(), "sink reported flush failure");
            }
            Err(panic) => {
                tracing::error!(
                    sink = sink.name(),
                    panic = %panic_message(panic.as_ref()),
                    "sink panicked during flush"
                );
            }
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventSource, EventType};
    use crate::sinks::MemorySink;
    use async_trait::async_trait;

    fn event_for(execution: &str) -> Event {
        Event::new(execution, EventType::StateDelta, EventSource::Node)
    }

    fn small_pipeline(sinks: Vec<Arc<dyn Sink>>) -> EventPipeline {
        EventPipeline::new(
            PipelineConfig {
                queue_capacity: 8,
                batch_size: 4,
                flush_interval: Duration::from_millis(20),
                enqueue_wait: Duration::from_millis(50),
            },
            sinks,
        )
    }

    /// Always raises from `write`.
    struct PanickingSink;

    #[async_trait]
    impl Sink for PanickingSink {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn write(&self, _event: &Event) -> bool {
            panic!("sink exploded");
        }
    }

    /// Always reports failure from `write`.
    struct RefusingSink;

    #[async_trait]
    impl Sink for RefusingSink {
        fn name(&self) -> &'static str {
            "refusing"
        }
        fn write(&self, _event: &Event) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn flood_larger_than_queue_loses_nothing_and_keeps_order() {
        let memory = Arc::new(MemorySink::new());
        let pipeline = small_pipeline(vec![memory.clone()]);

        // 100 events through a queue of capacity 8.
        for _ in 0..100 {
            assert!(pipeline.emit(event_for("exec-flood")).await);
        }
        pipeline.flush().await;

        let seen = memory.snapshot();
        assert_eq!(seen.len(), 100);
        let seqs: Vec<u64> = seen
            .iter()
            .filter(|e| e.execution_id == "exec-flood")
            .map(|e| e.seq)
            .collect();
        assert!(
            seqs.windows(2).all(|w| w[0] <= w[1]),
            "per-execution seq order violated"
        );
    }

    #[tokio::test]
    async fn concurrent_producers_keep_per_execution_order() {
        let memory = Arc::new(MemorySink::new());
        let pipeline = Arc::new(small_pipeline(vec![memory.clone()]));

        let mut handles = Vec::new();
        for producer in 0..4 {
            let pipeline = Arc::clone(&pipeline);
            handles.push(tokio::spawn(async move {
                let id = format!("exec-{producer}");
                for _ in 0..50 {
                    pipeline.emit(event_for(&id)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        pipeline.flush().await;

        let seen = memory.snapshot();
        assert_eq!(seen.len(), 200);
        for producer in 0..4 {
            let id = format!("exec-{producer}");
            let seqs: Vec<u64> = seen
                .iter()
                .filter(|e| e.execution_id == id)
                .map(|e| e.seq)
                .collect();
            assert_eq!(seqs.len(), 50);
            assert!(seqs.windows(2).all(|w| w[0] <= w[1]), "order lost for {id}");
        }
    }

    #[tokio::test]
    async fn panicking_sink_does_not_starve_the_others() {
        let memory = Arc::new(MemorySink::new());
        let pipeline = small_pipeline(vec![Arc::new(PanickingSink), memory.clone()]);

        for _ in 0..10 {
            pipeline.emit(event_for("exec-panic")).await;
        }
        pipeline.flush().await;

        assert_eq!(memory.len(), 10);
    }

    #[tokio::test]
    async fn refusing_sink_does_not_starve_the_others() {
        let memory = Arc::new(MemorySink::new());
        let pipeline = small_pipeline(vec![Arc::new(RefusingSink), memory.clone()]);

        for _ in 0..10 {
            pipeline.emit(event_for("exec-refuse")).await;
        }
        pipeline.flush().await;

        assert_eq!(memory.len(), 10);
    }

    #[tokio::test]
    async fn interval_flushes_partial_batches() {
        let memory = Arc::new(MemorySink::new());
        // Batch threshold far above what we emit; only the interval fires.
        let pipeline = EventPipeline::new(
            PipelineConfig {
                queue_capacity: 8,
                batch_size: 1000,
                flush_interval: Duration::from_millis(10),
                enqueue_wait: Duration::from_millis(50),
            },
            vec![memory.clone()],
        );

        pipeline.emit(event_for("exec-tick")).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_drains_and_refuses_afterwards() {
        let memory = Arc::new(MemorySink::new());
        let pipeline = small_pipeline(vec![memory.clone()]);

        for _ in 0..5 {
            assert!(pipeline.emit(event_for("exec-down")).await);
        }
        pipeline.shutdown().await;
        assert_eq!(memory.len(), 5);

        // Refused, not silently dropped.
        assert!(!pipeline.emit(event_for("exec-down")).await);
        assert_eq!(memory.len(), 5);

        // Idempotent.
        pipeline.shutdown().await;
        pipeline.flush().await;
    }

    #[tokio::test]
    async fn flush_on_empty_pipeline_is_a_no_op() {
        let memory = Arc::new(MemorySink::new());
        let pipeline = small_pipeline(vec![memory.clone()]);
        pipeline.flush().await;
        pipeline.flush().await;
        assert!(memory.is_empty());
    }
}
