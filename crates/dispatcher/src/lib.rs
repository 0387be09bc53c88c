//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 作为唯一消费者排空 metric 队列
//! - Fan-out 到多个 sinks (顺序或每 sink 独立 worker)
//! - 隔离失败/panic 的 sink，不阻塞其他 sink 与队列排空

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{MetricMessage, MetricSink};
pub use dispatcher::{DaemonConfig, DispatchDaemon, DispatchSummary};
pub use error::DispatcherError;
pub use handle::{SharedBatch, SinkHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{create_sink, create_sinks, ConsoleSink, PenguinSink, PenguinSinkConfig};
