//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate: the metric message,
//! the configuration tree, the backend sink trait and the error taxonomy.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Message timestamps are UTC wall-clock (`chrono::DateTime<Utc>`)
//! - A message without a timestamp is stamped when it enters the queue

mod adapters;
mod config;
mod error;
mod message;
mod sink;

pub use adapters::AdapterSet;
pub use config::*;
pub use error::*;
pub use message::{MetricMessage, MetricValue, Tags};
pub use sink::MetricSink;
