//! # Ingestion
//!
//! Metric ingestion module.
//!
//! Responsibilities:
//! - Bounded metric queue with an explicit backpressure policy
//! - Parse HTTP bodies and log lines into `MetricMessage`
//! - HTTP listener (ingest, health, Prometheus endpoints; optional TLS)
//! - Log watcher tailing one or more files
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{HttpListener, InputAdapter, LogWatcher, MetricQueue};
//!
//! let (producer, consumer) = MetricQueue::from_config(&config.queue);
//!
//! let http = HttpListener::new(&config, producer.clone()).with_metrics_handle(handle);
//! tokio::spawn(http.run(shutdown.clone()));
//!
//! let watcher = LogWatcher::new(&config.inputs.log, producer);
//! watcher.run(shutdown).await?;
//!
//! while let Some(message) = consumer.dequeue().await {
//!     // Dispatch to sinks
//! }
//! ```

mod adapter;
mod config;
mod error;
mod http;
mod log_watcher;
mod parser;
mod queue;

// Re-exports
pub use adapter::{InputAdapter, LocalInputAdapter};
pub use config::{BackpressurePolicy, IngestionMetrics, MetricsSnapshot};
pub use contracts::MetricMessage;
pub use error::{IngestionError, QueueError, Result};
pub use http::{BoundHttpListener, CorrelationId, HttpListener, CORRELATION_ID_HEADER};
pub use log_watcher::LogWatcher;
pub use parser::{parse_http_body, parse_log_line, HTTP_SOURCE, LOG_SOURCE};
pub use queue::{MetricQueue, QueueConsumer, QueueProducer};
