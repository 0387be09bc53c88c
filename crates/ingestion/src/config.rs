//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{QueueConfig, QueuePolicy};

/// What `enqueue` does when the queue is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Suspend the producer until the consumer frees a slot
    #[default]
    Block,
    /// Fail immediately with `QueueError::Full`
    Reject,
    /// Suspend up to the given duration, then fail with `QueueError::Full`
    Timeout(Duration),
}

impl From<&QueueConfig> for BackpressurePolicy {
    fn from(config: &QueueConfig) -> Self {
        match config.policy {
            QueuePolicy::Block => Self::Block,
            QueuePolicy::Reject => Self::Reject,
            QueuePolicy::Timeout => Self::Timeout(Duration::from_millis(config.timeout_ms)),
        }
    }
}

/// Per-adapter ingestion metrics
///
/// Local counters back `snapshot()`; every record is mirrored to the
/// Prometheus recorder labelled with the adapter's source name.
#[derive(Debug)]
pub struct IngestionMetrics {
    source: &'static str,

    /// Messages produced by parsing
    messages_received: AtomicU64,

    /// Messages accepted by the queue
    messages_enqueued: AtomicU64,

    /// Messages refused by the queue
    enqueue_rejected: AtomicU64,

    /// Inputs that failed to parse
    parse_errors: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            messages_received: AtomicU64::new(0),
            messages_enqueued: AtomicU64::new(0),
            enqueue_rejected: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Record parsed messages
    pub fn record_received(&self, count: usize) {
        self.messages_received
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record message accepted by the queue
    pub fn record_enqueued(&self) {
        self.messages_enqueued.fetch_add(1, Ordering::Relaxed);
        observability::record_message_enqueued(self.source);
    }

    /// Record message refused by the queue
    pub fn record_rejected(&self) {
        self.enqueue_rejected.fetch_add(1, Ordering::Relaxed);
        observability::record_enqueue_rejected(self.source);
    }

    /// Record parse error
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        observability::record_parse_error(self.source);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            enqueue_rejected: self.enqueue_rejected.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_enqueued: u64,
    pub enqueue_rejected: u64,
    pub parse_errors: u64,
}
