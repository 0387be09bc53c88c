//! Relay run statistics.

use std::net::SocketAddr;
use std::time::Duration;

use contracts::AdapterSet;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Input adapters that ran
    pub adapters: Option<AdapterSet>,

    /// Address the HTTP listener was bound to
    pub http_addr: Option<SocketAddr>,

    /// Messages the daemon took from the queue
    pub messages_dispatched: u64,

    /// Batches the daemon took from the queue
    pub batches_dispatched: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Number of configured sinks
    pub active_sinks: usize,

    /// HTTP listener counters
    pub http: Option<ingestion::MetricsSnapshot>,

    /// Log watcher counters
    pub watcher: Option<ingestion::MetricsSnapshot>,

    /// Per-sink counters, in registry order
    pub sinks: Vec<(String, dispatcher::MetricsSnapshot)>,
}

impl RelayStats {
    /// Messages dispatched per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_dispatched as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Relay Statistics ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Messages dispatched: {}", self.messages_dispatched);
        println!("   Batches dispatched: {}", self.batches_dispatched);
        println!("   Throughput: {:.2} msg/s", self.throughput());
        println!("   Active sinks: {}", self.active_sinks);

        for (label, snapshot) in [("HTTP listener", &self.http), ("Log watcher", &self.watcher)] {
            if let Some(s) = snapshot {
                println!("\n{label}");
                println!("   Received: {}", s.messages_received);
                println!("   Enqueued: {}", s.messages_enqueued);
                println!("   Rejected: {}", s.enqueue_rejected);
                println!("   Parse errors: {}", s.parse_errors);
            }
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, s) in &self.sinks {
                println!(
                    "   {}: {} messages in {} batches, {} failures, {} panics, latency(ms) {}",
                    name, s.message_count, s.batch_count, s.failure_count, s.panic_count, s.latency_ms
                );
            }
        }

        println!();
    }
}
