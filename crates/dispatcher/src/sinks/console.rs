//! ConsoleSink - logs metric batches via tracing

use async_trait::async_trait;
use contracts::{ContractError, MetricMessage, MetricSink};
use tracing::{debug, info, instrument};

/// Sink that logs every batch, for local debugging
pub struct ConsoleSink {
    name: String,
}

impl ConsoleSink {
    /// Create a new ConsoleSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl MetricSink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "console_sink_send",
        skip(self, batch),
        fields(sink = %self.name, batch = batch.len())
    )]
    async fn send(&mut self, batch: &[MetricMessage]) -> Result<(), ContractError> {
        for message in batch {
            debug!(
                metric = %message.name,
                value = ?message.value,
                tags = ?message.tags,
                timestamp = ?message.timestamp,
                "metric"
            );
        }
        info!("sent {} metrics to console backend", batch.len());
        Ok(())
    }

    #[instrument(name = "console_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "ConsoleSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_sink_send() {
        let mut sink = ConsoleSink::new("console");
        let batch = [MetricMessage::new("cpu", 0.5).with_tag("host", "a")];

        assert!(sink.send(&batch).await.is_ok());
        assert!(sink.send(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_console_sink_name() {
        let sink = ConsoleSink::new("my_console");
        assert_eq!(sink.name(), "my_console");
    }
}
