//! Sink implementations
//!
//! Contains ConsoleSink and PenguinSink.

mod console;
mod penguin;

pub use self::console::ConsoleSink;
pub use self::penguin::{PenguinSink, PenguinSinkConfig};

use contracts::{MetricSink, SinkConfig, SinkType};
use tracing::instrument;

use crate::error::DispatcherError;

/// Create a sink from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink(config: &SinkConfig) -> Result<Box<dyn MetricSink>, DispatcherError> {
    match config.sink_type {
        SinkType::Console => Ok(Box::new(ConsoleSink::new(&config.name))),
        SinkType::Penguin => {
            let sink = PenguinSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(Box::new(sink))
        }
    }
}

/// Create every configured sink, in registry order
pub fn create_sinks(configs: &[SinkConfig]) -> Result<Vec<Box<dyn MetricSink>>, DispatcherError> {
    configs.iter().map(create_sink).collect()
}
