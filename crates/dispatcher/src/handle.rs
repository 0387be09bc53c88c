//! SinkHandle - manages a sink with isolated queue and worker task

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use contracts::{MetricMessage, MetricSink};
use futures_util::FutureExt;
use observability::DispatchOutcome;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::metrics::SinkMetrics;

/// Batch shared by every sink worker
pub type SharedBatch = Arc<[MetricMessage]>;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send batches to worker
    tx: mpsc::Sender<SharedBatch>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn(sink: Box<dyn MetricSink>, metrics: Arc<SinkMetrics>, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a batch to the worker, waiting while its queue is full
    ///
    /// Returns false only if the worker is gone.
    pub async fn send(&self, batch: SharedBatch) -> bool {
        match self.tx.send(batch).await {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(_) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker after it drains its queue
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes batches and sends them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker(
    mut sink: Box<dyn MetricSink>,
    mut rx: mpsc::Receiver<SharedBatch>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(batch) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        deliver(sink.as_mut(), &batch, &metrics).await;
    }

    close_sink(sink.as_mut(), &metrics).await;
    debug!(sink = %name, "Sink worker stopped");
}

/// Send one batch to one sink, isolating errors and panics
///
/// Failures are logged and counted, never retried.
pub(crate) async fn deliver(
    sink: &mut dyn MetricSink,
    batch: &[MetricMessage],
    metrics: &SinkMetrics,
) -> DispatchOutcome {
    let started = Instant::now();
    let result = AssertUnwindSafe(sink.send(batch)).catch_unwind().await;
    let elapsed = started.elapsed();

    let outcome = match result {
        Ok(Ok(())) => {
            metrics.record_success(batch.len(), elapsed);
            DispatchOutcome::Success
        }
        Ok(Err(e)) => {
            metrics.inc_failure_count();
            error!(
                sink = %sink.name(),
                messages = batch.len(),
                error = %e,
                "Send failed, batch not retried"
            );
            DispatchOutcome::Failure
        }
        Err(panic) => {
            metrics.inc_panic_count();
            error!(
                sink = %sink.name(),
                messages = batch.len(),
                panic = %panic_message(panic.as_ref()),
                "Sink panicked during send"
            );
            DispatchOutcome::Panic
        }
    };

    observability::record_dispatch(sink.name(), outcome, batch.len(), elapsed);
    outcome
}

/// Flush and close a sink, logging failures
///
/// Panics are caught and counted like send panics; close still runs after a
/// panicking flush.
pub(crate) async fn close_sink(sink: &mut dyn MetricSink, metrics: &SinkMetrics) {
    match AssertUnwindSafe(sink.flush()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(sink = %sink.name(), error = %e, "Flush failed on shutdown"),
        Err(panic) => {
            metrics.inc_panic_count();
            error!(
                sink = %sink.name(),
                panic = %panic_message(panic.as_ref()),
                "Sink panicked during flush"
            );
        }
    }

    match AssertUnwindSafe(sink.close()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(sink = %sink.name(), error = %e, "Close failed on shutdown"),
        Err(panic) => {
            metrics.inc_panic_count();
            error!(
                sink = %sink.name(),
                panic = %panic_message(panic.as_ref()),
                "Sink panicked during close"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
