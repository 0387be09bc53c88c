//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use observability::{RunningStats, StatsSummary};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current worker queue length (concurrent mode only)
    queue_len: AtomicUsize,
    /// Batches accepted by the sink
    batch_count: AtomicU64,
    /// Messages accepted by the sink
    message_count: AtomicU64,
    /// Batches the sink refused
    failure_count: AtomicU64,
    /// Batches whose send panicked
    panic_count: AtomicU64,
    /// Successful send latency in milliseconds
    latency_ms: Mutex<RunningStats>,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current queue length
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// Set current queue length
    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Record an accepted batch
    pub fn record_success(&self, messages: usize, elapsed: Duration) {
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        self.message_count
            .fetch_add(messages as u64, Ordering::Relaxed);
        if let Ok(mut stats) = self.latency_ms.lock() {
            stats.push(elapsed.as_secs_f64() * 1000.0);
        }
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count.load(Ordering::Relaxed)
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get panic count
    pub fn panic_count(&self) -> u64 {
        self.panic_count.load(Ordering::Relaxed)
    }

    /// Increment panic count
    pub fn inc_panic_count(&self) {
        self.panic_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency_ms = self
            .latency_ms
            .lock()
            .map(|stats| StatsSummary::from(&*stats))
            .unwrap_or_default();

        MetricsSnapshot {
            queue_len: self.queue_len(),
            batch_count: self.batch_count(),
            message_count: self.message_count(),
            failure_count: self.failure_count(),
            panic_count: self.panic_count(),
            latency_ms,
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub batch_count: u64,
    pub message_count: u64,
    pub failure_count: u64,
    pub panic_count: u64,
    pub latency_ms: StatsSummary,
}
