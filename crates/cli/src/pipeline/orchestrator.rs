//! Relay orchestrator - composes adapters, queue, daemon and sinks.
//!
//! Every fallible setup step (adapter selection, sink creation, TLS loading,
//! socket binding) happens before anything is spawned, so a bad configuration
//! never leaves a partially started relay behind.

use std::time::Instant;

use contracts::{AdapterSet, MetricSink, RelayConfig};
use dispatcher::{create_sinks, DaemonConfig, DispatchDaemon, DispatchSummary};
use ingestion::{BoundHttpListener, HttpListener, InputAdapter, LogWatcher, MetricQueue};
use observability::MetricsHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::RelayStats;
use crate::error::{CliError, Result};

/// Relay orchestrator
pub struct Relay {
    config: RelayConfig,
    sinks: Option<Vec<Box<dyn MetricSink>>>,
    metrics_handle: Option<MetricsHandle>,
}

impl Relay {
    /// Create a relay from a validated configuration
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            sinks: None,
            metrics_handle: None,
        }
    }

    /// Use these sinks instead of building them from `config.sinks`
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_sinks(mut self, sinks: Vec<Box<dyn MetricSink>>) -> Self {
        self.sinks = Some(sinks);
        self
    }

    /// Attach the Prometheus handle served on the metrics endpoint
    pub fn with_metrics_handle(mut self, handle: MetricsHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Run until the adapters stop or `shutdown` is cancelled, then drain
    pub async fn run(self, shutdown: CancellationToken) -> Result<RelayStats> {
        let start_time = Instant::now();
        let config = self.config;

        let adapters = AdapterSet::from_inputs(&config.inputs)?;
        let sinks = match self.sinks {
            Some(sinks) => sinks,
            None => create_sinks(&config.sinks)?,
        };
        if sinks.is_empty() {
            warn!("No sinks configured, messages will be consumed and discarded");
        }

        let (producer, consumer) = MetricQueue::from_config(&config.queue);

        let mut stats = RelayStats {
            adapters: Some(adapters),
            active_sinks: sinks.len(),
            ..RelayStats::default()
        };

        let http = if adapters.runs_http() {
            let mut listener = HttpListener::new(&config, producer.clone());
            if let Some(handle) = self.metrics_handle {
                listener = listener.with_metrics_handle(handle);
            }
            let http_metrics = listener.metrics();
            let bound = listener.bind().await?;
            stats.http_addr = Some(bound.local_addr());
            Some((bound, http_metrics))
        } else {
            None
        };

        let watcher = adapters.runs_watcher().then(|| {
            let watcher = LogWatcher::new(&config.inputs.log, producer.clone());
            let watcher_metrics = watcher.metrics();
            (watcher, watcher_metrics)
        });

        let daemon = DispatchDaemon::new(consumer, sinks, DaemonConfig::from(&config.dispatch));
        let daemon_task = daemon.spawn();

        info!(
            adapters = ?adapters,
            queue_capacity = producer.capacity(),
            queue_policy = ?producer.policy(),
            "Relay started"
        );

        let (http, http_metrics) = split(http);
        let (watcher, watcher_metrics) = split(watcher);

        let adapter_result = run_adapters(adapters, http, watcher, shutdown).await;

        // Reject new work; the daemon drains what is resident
        producer.close();
        let remaining = producer.len();
        drop(producer);

        let grace = config.app.shutdown_grace();
        info!(
            queued = remaining,
            grace_ms = grace.as_millis() as u64,
            "Adapters stopped, draining queue"
        );

        let dispatch = drain(daemon_task, grace).await;

        stats.duration = start_time.elapsed();
        stats.http = http_metrics.map(|m| m.snapshot());
        stats.watcher = watcher_metrics.map(|m| m.snapshot());
        match dispatch {
            Ok(summary) => {
                stats.messages_dispatched = summary.messages;
                stats.batches_dispatched = summary.batches;
                stats.sinks = summary.sinks;
            }
            Err(e) => {
                adapter_result?;
                return Err(e);
            }
        }

        adapter_result.map(|()| stats)
    }
}

fn split<A, B>(pair: Option<(A, B)>) -> (Option<A>, Option<B>) {
    match pair {
        Some((a, b)) => (Some(a), Some(b)),
        None => (None, None),
    }
}

/// Run the active adapters in the shape the adapter set prescribes
async fn run_adapters(
    adapters: AdapterSet,
    http: Option<BoundHttpListener>,
    watcher: Option<LogWatcher>,
    shutdown: CancellationToken,
) -> Result<()> {
    match (adapters, http, watcher) {
        (AdapterSet::HttpOnly, Some(http), _) => Ok(http.serve(shutdown).await?),
        (AdapterSet::WatcherOnly, _, Some(watcher)) => {
            // Sole foreground loop, no HTTP server
            Ok(watcher.run(shutdown).await?)
        }
        (AdapterSet::HttpAndWatcher, Some(http), Some(watcher)) => {
            let background = tokio::spawn(watcher.run(shutdown.clone()));
            let served = http.serve(shutdown.clone()).await;

            // The listener may stop on its own error; take the watcher down with it
            shutdown.cancel();
            let watched = match background.await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Log watcher task panicked");
                    Ok(())
                }
            };

            served?;
            Ok(watched?)
        }
        (adapters, _, _) => Err(CliError::shutdown(format!(
            "adapters {adapters:?} were not started"
        ))),
    }
}

/// Wait for the daemon to drain, abandoning what is left after `grace`
async fn drain(
    mut daemon_task: JoinHandle<DispatchSummary>,
    grace: std::time::Duration,
) -> Result<DispatchSummary> {
    match tokio::time::timeout(grace, &mut daemon_task).await {
        Ok(Ok(summary)) => Ok(summary),
        Ok(Err(e)) => Err(CliError::shutdown(format!("dispatch daemon failed: {e}"))),
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Drain deadline exceeded, abandoning undelivered messages"
            );
            daemon_task.abort();
            Err(CliError::shutdown("queue not drained before deadline"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contracts::{ContractError, MetricMessage};
    use std::io::Write;
    use std::net::TcpListener as StdTcpListener;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingSink {
        received: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MetricSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&mut self, batch: &[MetricMessage]) -> std::result::Result<(), ContractError> {
            let mut received = self.received.lock().unwrap();
            received.extend(batch.iter().map(|m| m.name.clone()));
            Ok(())
        }
    }

    fn recording() -> (Vec<Box<dyn MetricSink>>, Arc<Mutex<Vec<String>>>) {
        let received: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = RecordingSink {
            received: Arc::clone(&received),
        };
        (vec![Box::new(sink)], received)
    }

    fn free_port() -> u16 {
        StdTcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    async fn wait_for(received: &Arc<Mutex<Vec<String>>>, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while received.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sink did not receive expected messages");
    }

    fn base_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.inputs.http.host = "127.0.0.1".to_string();
        config.inputs.http.port = free_port();
        config.inputs.log.poll_interval_ms = 10;
        config.inputs.log.from_beginning = true;
        config
    }

    #[tokio::test]
    async fn test_watcher_only_binds_no_http() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("metrics.log");
        std::fs::write(&log_path, "disk 1\ndisk 2\n").unwrap();

        let mut config = base_config();
        let port = config.inputs.http.port;
        config.inputs.http.enabled = false;
        config.inputs.log.enabled = true;
        config.inputs.log.paths = vec![log_path];

        let (sinks, received) = recording();
        let shutdown = CancellationToken::new();
        let relay = tokio::spawn(Relay::new(config).with_sinks(sinks).run(shutdown.clone()));

        wait_for(&received, 2).await;
        assert!(tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err());

        shutdown.cancel();
        let stats = relay.await.unwrap().unwrap();
        assert_eq!(stats.adapters, Some(AdapterSet::WatcherOnly));
        assert!(stats.http_addr.is_none());
        assert_eq!(stats.messages_dispatched, 2);
    }

    #[tokio::test]
    async fn test_http_and_watcher_run_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("metrics.log");
        std::fs::write(&log_path, "").unwrap();

        let mut config = base_config();
        let port = config.inputs.http.port;
        config.inputs.log.enabled = true;
        config.inputs.log.paths = vec![log_path.clone()];

        let (sinks, received) = recording();
        let shutdown = CancellationToken::new();
        let relay = tokio::spawn(Relay::new(config).with_sinks(sinks).run(shutdown.clone()));

        // Wait for the listener to come up
        let client = reqwest::Client::new();
        let url = format!("http://127.0.0.1:{port}/api/v1/metrics");
        let mut accepted = false;
        for _ in 0..100 {
            if let Ok(response) = client.post(&url).body(r#"{"name":"from_http","value":1}"#).send().await {
                assert_eq!(response.status().as_u16(), 202);
                accepted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(accepted, "HTTP listener never accepted a request");

        let mut file = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(b"from_log 2\n").unwrap();

        wait_for(&received, 2).await;
        shutdown.cancel();
        let stats = relay.await.unwrap().unwrap();

        let mut names = received.lock().unwrap().clone();
        names.sort();
        assert_eq!(names, ["from_http", "from_log"]);
        assert_eq!(stats.adapters, Some(AdapterSet::HttpAndWatcher));
        assert_eq!(stats.http.unwrap().messages_enqueued, 1);
        assert_eq!(stats.watcher.unwrap().messages_enqueued, 1);
    }

    #[tokio::test]
    async fn test_no_inputs_is_startup_error() {
        let mut config = base_config();
        config.inputs.http.enabled = false;
        config.inputs.log.enabled = false;

        let (sinks, _received) = recording();
        let err = Relay::new(config)
            .with_sinks(sinks)
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[tokio::test]
    async fn test_port_in_use_is_startup_error() {
        let occupied = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = base_config();
        config.inputs.http.port = occupied.local_addr().unwrap().port();

        let (sinks, received) = recording();
        let err = Relay::new(config)
            .with_sinks(sinks)
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Ingestion(_)));
        assert!(received.lock().unwrap().is_empty());
    }
}
