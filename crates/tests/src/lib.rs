//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 队列 -> daemon -> sinks 的完整链路
//! - HTTP 输入端到端 (真实 socket)
//! - 失败 sink 隔离与背压行为

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, MetricMessage, MetricSink, MetricValue, RelayConfig};
    use dispatcher::{DaemonConfig, DispatchDaemon};
    use ingestion::{BackpressurePolicy, HttpListener, MetricQueue, QueueError};
    use tokio_util::sync::CancellationToken;

    /// Records every delivered message in order
    struct RecordingSink {
        name: String,
        received: Arc<Mutex<Vec<MetricMessage>>>,
    }

    impl RecordingSink {
        fn boxed(name: &str) -> (Box<dyn MetricSink>, Arc<Mutex<Vec<MetricMessage>>>) {
            let received: Arc<Mutex<Vec<MetricMessage>>> = Arc::default();
            let sink = Self {
                name: name.to_string(),
                received: Arc::clone(&received),
            };
            (Box::new(sink), received)
        }
    }

    #[async_trait]
    impl MetricSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&mut self, batch: &[MetricMessage]) -> Result<(), ContractError> {
            self.received.lock().unwrap().extend_from_slice(batch);
            Ok(())
        }
    }

    /// In-memory log destination for a scoped subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Rejects every batch
    struct FailingSink;

    #[async_trait]
    impl MetricSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&mut self, _batch: &[MetricMessage]) -> Result<(), ContractError> {
            Err(ContractError::sink_send("failing", "backend unavailable"))
        }
    }

    fn http_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.inputs.http.host = "127.0.0.1".to_string();
        config.inputs.http.port = 0;
        config.output.prometheus.enabled = false;
        config
    }

    /// End-to-end test: HTTP POST -> queue -> daemon -> sink
    ///
    /// 验证 name / value / tags / timestamp 原样到达 sink。
    #[tokio::test]
    async fn test_e2e_http_roundtrip() {
        let (producer, consumer) = MetricQueue::bounded(64, BackpressurePolicy::Block);
        let (sink, received) = RecordingSink::boxed("recording");
        let daemon = DispatchDaemon::new(consumer, vec![sink], DaemonConfig::default()).spawn();

        let listener = HttpListener::new(&http_config(), producer.clone());
        let bound = listener.bind().await.unwrap();
        let addr = bound.local_addr();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(bound.serve(shutdown.clone()));

        let body = serde_json::json!([
            {
                "name": "cpu.load",
                "value": 0.75,
                "tags": {"host": "web-1", "region": "eu"},
                "timestamp": "2024-05-01T12:00:00Z"
            },
            {
                "name": "build.info",
                "value": {"version": "1.2.3", "features": ["tls"]}
            }
        ]);
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/api/v1/metrics"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);
        let reply: serde_json::Value = response.json().await.unwrap();
        assert_eq!(reply["accepted"], 2);

        shutdown.cancel();
        server.await.unwrap().unwrap();
        producer.close();
        drop(producer);

        let summary = tokio::time::timeout(Duration::from_secs(5), daemon)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.messages, 2);

        let received = received.lock().unwrap();
        let expected = MetricMessage::new("cpu.load", 0.75)
            .with_tag("host", "web-1")
            .with_tag("region", "eu")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert_eq!(received[0], expected);

        assert_eq!(received[1].name, "build.info");
        assert_eq!(
            received[1].value,
            MetricValue::from(serde_json::json!({"version": "1.2.3", "features": ["tls"]}))
        );
        // Stamped at enqueue
        assert!(received[1].timestamp.is_some());
    }

    /// Malformed bodies are rejected whole; nothing reaches the queue
    #[tokio::test]
    async fn test_e2e_malformed_http_leaves_queue_untouched() {
        let (producer, consumer) = MetricQueue::bounded(8, BackpressurePolicy::Block);

        let listener = HttpListener::new(&http_config(), producer.clone());
        let metrics = listener.metrics();
        let bound = listener.bind().await.unwrap();
        let addr = bound.local_addr();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(bound.serve(shutdown.clone()));

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/api/v1/metrics");
        for body in [
            "not json",
            r#"{"value": 1}"#,
            r#"[{"name":"ok","value":1},{"name":"","value":2}]"#,
        ] {
            let response = client.post(&url).body(body).send().await.unwrap();
            assert_eq!(response.status().as_u16(), 400, "body: {body}");
        }

        shutdown.cancel();
        server.await.unwrap().unwrap();

        assert!(consumer.is_empty());
        assert_eq!(metrics.snapshot().parse_errors, 3);
        assert_eq!(metrics.snapshot().messages_enqueued, 0);
    }

    /// Single-producer FIFO order survives batching
    #[tokio::test]
    async fn test_e2e_fifo_through_daemon() {
        let (producer, consumer) = MetricQueue::bounded(16, BackpressurePolicy::Block);
        let (sink, received) = RecordingSink::boxed("recording");
        let config = DaemonConfig {
            batch_size: 7,
            ..DaemonConfig::default()
        };
        let daemon = DispatchDaemon::new(consumer, vec![sink], config).spawn();

        for i in 0..100 {
            producer
                .enqueue(MetricMessage::new(format!("seq.{i}"), i as f64))
                .await
                .unwrap();
        }
        producer.close();
        drop(producer);

        let summary = daemon.await.unwrap();
        assert_eq!(summary.messages, 100);

        let names: Vec<String> = received.lock().unwrap().iter().map(|m| m.name.clone()).collect();
        let expected: Vec<String> = (0..100).map(|i| format!("seq.{i}")).collect();
        assert_eq!(names, expected);
    }

    /// A failing sink neither blocks the healthy one nor stalls draining,
    /// and every failure is logged
    #[tokio::test]
    async fn test_e2e_failing_sink_isolated() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (producer, consumer) = MetricQueue::bounded(16, BackpressurePolicy::Block);
        let (healthy, received) = RecordingSink::boxed("healthy");
        let sinks: Vec<Box<dyn MetricSink>> = vec![Box::new(FailingSink), healthy];

        for i in 0..10 {
            producer
                .enqueue(MetricMessage::new("requests", i as f64))
                .await
                .unwrap();
        }
        producer.close();

        let summary = DispatchDaemon::new(consumer, sinks, DaemonConfig::default())
            .run()
            .await;

        assert_eq!(summary.messages, 10);
        assert_eq!(received.lock().unwrap().len(), 10);
        assert!(producer.is_empty());

        let (name, failing) = &summary.sinks[0];
        assert_eq!(name, "failing");
        assert_eq!(failing.failure_count, 10);
        assert_eq!(summary.sinks[1].1.message_count, 10);

        let output = logs.text();
        let failures: Vec<&str> = output.lines().filter(|l| l.contains("Send failed")).collect();
        assert_eq!(failures.len(), 10);
        assert!(failures.iter().all(|l| l.contains("sink=failing")));
        assert!(failures.iter().all(|l| l.contains("backend unavailable")));
    }

    /// Blocking policy suspends the producer until space frees up
    #[tokio::test]
    async fn test_e2e_capacity_blocks_producer() {
        let (producer, consumer) = MetricQueue::bounded(2, BackpressurePolicy::Block);
        producer.enqueue(MetricMessage::new("a", 1.0)).await.unwrap();
        producer.enqueue(MetricMessage::new("b", 2.0)).await.unwrap();

        let blocked = {
            let producer = producer.clone();
            tokio::spawn(async move { producer.enqueue(MetricMessage::new("c", 3.0)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());
        assert_eq!(producer.len(), 2);

        assert_eq!(consumer.dequeue().await.unwrap().name, "a");
        blocked.await.unwrap().unwrap();

        assert_eq!(consumer.dequeue().await.unwrap().name, "b");
        assert_eq!(consumer.dequeue().await.unwrap().name, "c");
    }

    /// Reject policy fails fast once full
    #[tokio::test]
    async fn test_e2e_reject_policy() {
        let (producer, _consumer) = MetricQueue::bounded(1, BackpressurePolicy::Reject);
        producer.enqueue(MetricMessage::new("a", 1.0)).await.unwrap();

        let err = producer.enqueue(MetricMessage::new("b", 2.0)).await.unwrap_err();
        assert_eq!(err, QueueError::Full { capacity: 1 });
    }

    /// Configuration text drives queue, daemon mode and sink registry
    #[tokio::test]
    async fn test_e2e_config_driven_daemon() {
        let config = ConfigLoader::load_from_str(
            r#"
[queue]
capacity = 32
policy = "block"

[dispatch]
mode = "concurrent"
batch_size = 4

[[sinks]]
name = "console_a"
sink_type = "console"

[[sinks]]
name = "console_b"
sink_type = "console"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let (producer, consumer) = MetricQueue::from_config(&config.queue);
        assert_eq!(producer.capacity(), 32);

        let daemon = DispatchDaemon::from_config(consumer, &config.dispatch, &config.sinks).unwrap();
        let names: Vec<String> = daemon.metrics().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["console_a", "console_b"]);

        let task = daemon.spawn();
        for i in 0..12 {
            producer
                .enqueue(MetricMessage::new("queue.depth", i as f64).with_tag("env", "test"))
                .await
                .unwrap();
        }
        producer.close();
        drop(producer);

        let summary = task.await.unwrap();
        assert_eq!(summary.messages, 12);
        for (_, snapshot) in &summary.sinks {
            assert_eq!(snapshot.message_count, 12);
            assert_eq!(snapshot.failure_count, 0);
        }
    }
}
