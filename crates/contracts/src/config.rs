//! RelayConfig - Config Loader output
//!
//! Describes the complete relay setup: inputs, queue, dispatch, sinks,
//! logging and the metrics endpoint. Built once at startup and passed by
//! reference into every component; nothing reads ambient global state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 5000;

/// Health check path (fixed)
pub const HEALTH_PATH: &str = "/_health";

/// Favicon path (fixed, answered with 204)
pub const FAVICON_PATH: &str = "/favicon.ico";

/// Complete relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Application settings
    #[serde(default)]
    pub app: AppConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,

    /// Queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Input adapters
    #[serde(default)]
    pub inputs: InputsConfig,

    /// Self-observability outputs
    #[serde(default)]
    pub output: OutputConfig,

    /// Dispatch daemon settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Backend sinks
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run mode (affects verbosity only)
    #[serde(default)]
    pub mode: RunMode,

    /// Time the daemon gets to drain the queue on shutdown
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl AppConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn default_shutdown_grace_ms() -> u64 {
    5000
}

/// Run mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Access log at info level
    #[default]
    Dev,
    /// Access log at debug level
    Prod,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// "stdout" or a file path
    #[serde(default = "default_log_output")]
    pub output: String,

    /// Default level (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// Log file path, or `None` for stdout
    pub fn file_path(&self) -> Option<PathBuf> {
        if self.output.is_empty() || self.output.eq_ignore_ascii_case("stdout") {
            None
        } else {
            Some(PathBuf::from(&self.output))
        }
    }
}

fn default_log_output() -> String {
    "stdout".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Default single-line text
    #[default]
    Text,
    /// JSON structured logging
    Json,
    /// Multi-line human-readable
    Pretty,
    /// Compact single-line
    Compact,
}

/// Queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum resident messages
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Behaviour when full
    #[serde(default)]
    pub policy: QueuePolicy,

    /// Wait bound for `QueuePolicy::Timeout`
    #[serde(default = "default_enqueue_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            policy: QueuePolicy::default(),
            timeout_ms: default_enqueue_timeout_ms(),
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_enqueue_timeout_ms() -> u64 {
    1000
}

/// Full-queue policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Suspend the producer until space frees up
    #[default]
    Block,
    /// Fail immediately
    Reject,
    /// Wait up to `timeout_ms`, then fail
    Timeout,
}

/// Input adapter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputsConfig {
    /// HTTP listener
    #[serde(default)]
    pub http: HttpInputConfig,

    /// Log watcher
    #[serde(default)]
    pub log: LogInputConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpInputConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_http_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Ingestion path (POST)
    #[serde(default = "default_http_path")]
    pub path: String,

    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for HttpInputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_http_host(),
            port: default_http_port(),
            path: default_http_path(),
            tls: TlsConfig::default(),
        }
    }
}

impl HttpInputConfig {
    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_true() -> bool {
    true
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_path() -> String {
    "/api/v1/metrics".to_string()
}

/// TLS settings for the HTTP listener
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// PEM certificate chain
    #[serde(default)]
    pub cert_path: String,

    /// PEM PKCS#8 private key
    #[serde(default)]
    pub key_path: String,
}

/// Log watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInputConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Files to tail
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Poll interval for new data
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Read existing content instead of starting at end of file
    #[serde(default)]
    pub from_beginning: bool,
}

impl Default for LogInputConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            from_beginning: false,
        }
    }
}

impl LogInputConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn default_poll_interval_ms() -> u64 {
    250
}

/// Self-observability outputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Prometheus endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path served on the HTTP listener
    #[serde(default = "default_prometheus_endpoint")]
    pub endpoint: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_prometheus_endpoint(),
        }
    }
}

fn default_prometheus_endpoint() -> String {
    "/metrics".to_string()
}

/// Dispatch daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Max messages handed to a sink per send
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sink iteration strategy
    #[serde(default)]
    pub mode: DispatchMode,

    /// Per-sink worker queue (concurrent mode)
    #[serde(default = "default_sink_queue_capacity")]
    pub sink_queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            mode: DispatchMode::default(),
            sink_queue_capacity: default_sink_queue_capacity(),
        }
    }
}

/// Upper bound for `dispatch.batch_size`
pub const MAX_BATCH_SIZE: usize = 1000;

fn default_batch_size() -> usize {
    1
}

fn default_sink_queue_capacity() -> usize {
    100
}

/// Sink iteration strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Sinks attempted one after another in registry order
    #[default]
    Sequential,
    /// Each sink drains its own worker queue
    Concurrent,
}

/// Backend sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Console,
    /// Remote penguin relay (HTTP)
    Penguin,
}
