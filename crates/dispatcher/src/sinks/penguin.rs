//! PenguinSink - forwards batches to a remote relay over HTTP

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use contracts::{ContractError, MetricMessage, MetricSink};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, instrument};

const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Configuration for PenguinSink
#[derive(Debug, Clone)]
pub struct PenguinSinkConfig {
    /// Ingest endpoint of the remote relay
    pub url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

impl PenguinSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let url_str = params
            .get("url")
            .ok_or_else(|| "missing 'url' parameter".to_string())?;

        let url = Url::parse(url_str).map_err(|e| format!("invalid url '{}': {}", url_str, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported url scheme '{}'", url.scheme()));
        }

        let timeout_ms = match params.get("timeout_ms") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| format!("invalid timeout_ms '{}'", raw))?,
            None => DEFAULT_TIMEOUT_MS,
        };

        Ok(Self {
            url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Request body, identical to what the HTTP listener ingests
#[derive(Serialize)]
struct Envelope<'a> {
    metrics: &'a [MetricMessage],
}

/// Sink that POSTs batches to another relay
pub struct PenguinSink {
    name: String,
    config: PenguinSinkConfig,
    client: Client,
}

impl PenguinSink {
    /// Create a new PenguinSink
    pub fn new(name: impl Into<String>, config: PenguinSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        debug!(sink = %name, target = %config.url, "PenguinSink ready");

        Ok(Self {
            name,
            config,
            client,
        })
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = PenguinSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(name, config)
    }
}

#[async_trait]
impl MetricSink for PenguinSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "penguin_sink_send",
        skip(self, batch),
        fields(sink = %self.name, batch = batch.len())
    )]
    async fn send(&mut self, batch: &[MetricMessage]) -> Result<(), ContractError> {
        let response = self
            .client
            .post(self.config.url.clone())
            .json(&Envelope { metrics: batch })
            .send()
            .await
            .map_err(|e| ContractError::sink_send(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContractError::sink_send(
                &self.name,
                format!("remote relay responded {}", status),
            ));
        }

        debug!(status = status.as_u16(), "Batch forwarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn spawn_server(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/v1/metrics")
    }

    #[test]
    fn test_config_from_params() {
        let config =
            PenguinSinkConfig::from_params(&params(&[("url", "http://relay:8080/in")])).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));

        let config = PenguinSinkConfig::from_params(&params(&[
            ("url", "https://relay/in"),
            ("timeout_ms", "250"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));

        assert!(PenguinSinkConfig::from_params(&params(&[])).is_err());
        assert!(PenguinSinkConfig::from_params(&params(&[("url", "not a url")])).is_err());
        assert!(PenguinSinkConfig::from_params(&params(&[("url", "ftp://relay/")])).is_err());
        assert!(PenguinSinkConfig::from_params(&params(&[
            ("url", "http://relay/"),
            ("timeout_ms", "0")
        ]))
        .is_err());
    }

    #[tokio::test]
    async fn test_forwards_envelope() {
        let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let sink_received = Arc::clone(&received);
        let router = Router::new().route(
            "/api/v1/metrics",
            post(move |Json(body): Json<serde_json::Value>| {
                let received = Arc::clone(&sink_received);
                async move {
                    received.lock().unwrap().push(body);
                    StatusCode::ACCEPTED
                }
            }),
        );
        let url = spawn_server(router).await;

        let mut sink = PenguinSink::from_params("penguin", &params(&[("url", &url)])).unwrap();
        let batch = [
            MetricMessage::new("a", 1.0).with_tag("k", "v"),
            MetricMessage::new("b", 2.0),
        ];
        sink.send(&batch).await.unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let metrics = bodies[0]["metrics"].as_array().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0]["name"], "a");
        assert_eq!(metrics[0]["tags"]["k"], "v");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let router = Router::new().route(
            "/api/v1/metrics",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let url = spawn_server(router).await;

        let mut sink = PenguinSink::from_params("penguin", &params(&[("url", &url)])).unwrap();
        let err = sink.send(&[MetricMessage::new("a", 1.0)]).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkSend { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut sink = PenguinSink::from_params(
            "penguin",
            &params(&[("url", &format!("http://{addr}/")), ("timeout_ms", "500")]),
        )
        .unwrap();
        assert!(sink.send(&[MetricMessage::new("a", 1.0)]).await.is_err());
    }
}
