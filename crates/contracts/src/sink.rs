//! MetricSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for backend sinks.

use async_trait::async_trait;

use crate::{ContractError, MetricMessage};

/// Backend sink trait
///
/// All sink implementations must implement this trait. The daemon owns each
/// sink exclusively and hands batches out by shared reference, so a sink can
/// never mutate a message.
#[async_trait]
pub trait MetricSink: Send {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver a batch
    ///
    /// `Ok` means the sink accepted responsibility for the batch. An error
    /// means it did not; the caller never retries.
    ///
    /// # Errors
    /// Returns send error (should include context)
    async fn send(&mut self, batch: &[MetricMessage]) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
