//! DispatchDaemon - main loop for fan-out to sinks

use std::sync::Arc;

use contracts::{DispatchConfig, DispatchMode, MetricSink, SinkConfig, MAX_BATCH_SIZE};
use ingestion::QueueConsumer;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;
use crate::handle::{close_sink, deliver, SharedBatch, SinkHandle};
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::create_sinks;

/// Daemon configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Messages taken from the queue per sink invocation
    pub batch_size: usize,
    /// Sequential or per-sink concurrent delivery
    pub mode: DispatchMode,
    /// Worker queue capacity per sink (concurrent mode)
    pub sink_queue_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DaemonConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            batch_size: config.batch_size.clamp(1, MAX_BATCH_SIZE),
            mode: config.mode,
            sink_queue_capacity: config.sink_queue_capacity.max(1),
        }
    }
}

/// Totals reported when the daemon stops
#[derive(Debug, Clone)]
pub struct DispatchSummary {
    /// Messages taken from the queue
    pub messages: u64,
    /// Batches taken from the queue
    pub batches: u64,
    /// Per-sink metrics, in registry order
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// The single consumer of the metric queue
pub struct DispatchDaemon {
    consumer: QueueConsumer,
    sinks: Vec<Box<dyn MetricSink>>,
    metrics: Vec<Arc<SinkMetrics>>,
    config: DaemonConfig,
}

impl DispatchDaemon {
    /// Create a daemon over an already built sink registry
    pub fn new(consumer: QueueConsumer, sinks: Vec<Box<dyn MetricSink>>, config: DaemonConfig) -> Self {
        let metrics = sinks.iter().map(|_| Arc::new(SinkMetrics::new())).collect();
        Self {
            consumer,
            sinks,
            metrics,
            config,
        }
    }

    /// Create a daemon and its sinks from configuration
    #[instrument(
        name = "dispatch_daemon_from_config",
        skip(consumer, dispatch, sinks),
        fields(sink_count = sinks.len())
    )]
    pub fn from_config(
        consumer: QueueConsumer,
        dispatch: &DispatchConfig,
        sinks: &[SinkConfig],
    ) -> Result<Self, DispatcherError> {
        let sinks = create_sinks(sinks)?;
        Ok(Self::new(consumer, sinks, DaemonConfig::from(dispatch)))
    }

    /// Live metrics for all sinks, in registry order
    pub fn metrics(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.sinks
            .iter()
            .zip(&self.metrics)
            .map(|(sink, metrics)| (sink.name().to_string(), Arc::clone(metrics)))
            .collect()
    }

    /// Run the daemon main loop
    ///
    /// Drains the queue until it is closed and empty, then closes every sink.
    #[instrument(name = "dispatch_daemon_run", skip(self), fields(mode = ?self.config.mode))]
    pub async fn run(self) -> DispatchSummary {
        info!(
            sinks = self.sinks.len(),
            batch_size = self.config.batch_size,
            "Dispatch daemon started"
        );

        let names: Vec<String> = self.sinks.iter().map(|s| s.name().to_string()).collect();
        let metrics = self.metrics.clone();

        let (messages, batches) = match self.config.mode {
            DispatchMode::Sequential => self.run_sequential().await,
            DispatchMode::Concurrent => self.run_concurrent().await,
        };

        let summary = DispatchSummary {
            messages,
            batches,
            sinks: names
                .into_iter()
                .zip(metrics.iter().map(|m| m.snapshot()))
                .collect(),
        };

        info!(
            messages = summary.messages,
            batches = summary.batches,
            "Dispatch daemon input closed, shutting down"
        );
        for (name, snapshot) in &summary.sinks {
            info!(
                sink = %name,
                batches = snapshot.batch_count,
                messages = snapshot.message_count,
                failures = snapshot.failure_count,
                panics = snapshot.panic_count,
                latency_ms = %snapshot.latency_ms,
                "Sink summary"
            );
        }

        summary
    }

    /// Spawn the daemon as a background task
    pub fn spawn(self) -> JoinHandle<DispatchSummary> {
        tokio::spawn(self.run())
    }

    async fn run_sequential(self) -> (u64, u64) {
        let Self {
            consumer,
            mut sinks,
            metrics,
            config,
        } = self;

        let mut messages: u64 = 0;
        let mut batches: u64 = 0;

        while let Some(batch) = consumer.dequeue_batch(config.batch_size).await {
            messages += batch.len() as u64;
            batches += 1;

            for (sink, sink_metrics) in sinks.iter_mut().zip(&metrics) {
                deliver(sink.as_mut(), &batch, sink_metrics).await;
            }

            if batches.is_multiple_of(100) {
                debug!(messages, batches, queued = consumer.len(), "Dispatch progress");
            }
        }

        for (sink, sink_metrics) in sinks.iter_mut().zip(&metrics) {
            close_sink(sink.as_mut(), sink_metrics).await;
        }

        (messages, batches)
    }

    async fn run_concurrent(self) -> (u64, u64) {
        let Self {
            consumer,
            sinks,
            metrics,
            config,
        } = self;

        let handles: Vec<SinkHandle> = sinks
            .into_iter()
            .zip(metrics)
            .map(|(sink, sink_metrics)| {
                SinkHandle::spawn(sink, sink_metrics, config.sink_queue_capacity)
            })
            .collect();

        let mut messages: u64 = 0;
        let mut batches: u64 = 0;

        while let Some(batch) = consumer.dequeue_batch(config.batch_size).await {
            messages += batch.len() as u64;
            batches += 1;

            let batch: SharedBatch = batch.into();
            for handle in &handles {
                handle.send(Arc::clone(&batch)).await;
            }

            if batches.is_multiple_of(100) {
                debug!(messages, batches, queued = consumer.len(), "Dispatch progress");
            }
        }

        for handle in handles {
            handle.shutdown().await;
        }

        (messages, batches)
    }
}
