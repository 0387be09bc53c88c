//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (Text/JSON/Pretty/Compact 格式，stdout 或文件)
//! - Prometheus recorder 安装，handle 交给 HTTP listener 渲染
//! - relay 指标记录与统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init_tracing, install_prometheus_recorder};
//!
//! init_tracing(&config.log, config.app.mode, 0)?;
//! let handle = install_prometheus_recorder()?;
//! let body = handle.render();
//! ```

pub mod metrics;

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{LogConfig, LogFormat, RunMode};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_dispatch, record_enqueue_rejected, record_http_request, record_message_enqueued,
    record_parse_error, record_queue_depth, DispatchOutcome, RunningStats, StatsSummary,
};
pub use metrics_exporter_prometheus::PrometheusHandle as MetricsHandle;

/// 根据日志配置初始化 Tracing
///
/// - `RUST_LOG` 优先；否则使用 `log.level`，非法值回退到 `info`
/// - `verbosity` 来自 CLI (`-v` 次数)，只会提高日志级别
/// - `log.output` 为文件时自动创建父目录，以追加模式写入
pub fn init_tracing(config: &LogConfig, mode: RunMode, verbosity: u8) -> Result<()> {
    let filter = build_filter(&config.level, verbosity);

    let (writer, ansi) = match config.file_path() {
        Some(path) => (BoxMakeWriter::new(Arc::new(open_log_file(&path)?)), false),
        None => (BoxMakeWriter::new(std::io::stdout), stdout_ansi(mode)),
    };

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => fmt::layer().with_ansi(ansi).with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        log_format = ?config.format,
        output = %config.output,
        mode = ?mode,
        "Observability initialized"
    );

    Ok(())
}

/// stdout 只在 dev 模式着色
fn stdout_ansi(mode: RunMode) -> bool {
    mode == RunMode::Dev
}

fn build_filter(level: &str, verbosity: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = match verbosity {
        0 => level.to_lowercase(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 打开日志文件 (不存在则创建，包括父目录)
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Histogram bucket upkeep interval
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// 安装全局 Prometheus recorder
///
/// 返回的 handle 由 HTTP listener 的 metrics endpoint 渲染。
/// 同时在当前 Tokio runtime 上启动 upkeep 任务，定期清理 histogram bucket。
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    let runtime = tokio::runtime::Handle::try_current()
        .context("Prometheus upkeep requires a running Tokio runtime")?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let _guard = runtime.enter();
    spawn_upkeep(handle.clone(), UPKEEP_INTERVAL);

    tracing::info!(
        upkeep_secs = UPKEEP_INTERVAL.as_secs(),
        "Prometheus recorder installed"
    );
    Ok(handle)
}

/// Run `PrometheusHandle::run_upkeep` every `interval` until aborted
pub fn spawn_upkeep(handle: PrometheusHandle, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            handle.run_upkeep();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/penguin.log");

        let file = open_log_file(&path);
        assert!(file.is_ok(), "Failed: {:?}", file.err());
        assert!(path.exists());
    }

    #[test]
    fn test_ansi_only_in_dev() {
        assert!(stdout_ansi(RunMode::Dev));
        assert!(!stdout_ansi(RunMode::Prod));
    }

    #[tokio::test]
    async fn test_upkeep_task_keeps_running() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            record_dispatch(
                "console",
                DispatchOutcome::Success,
                1,
                Duration::from_millis(3),
            );
        });

        let upkeep = spawn_upkeep(handle.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!upkeep.is_finished());

        // Upkeep drains buckets into the summary without losing samples
        let output = handle.render();
        assert!(output.contains("penguin_dispatch_duration_seconds"));
        assert!(output.contains("penguin_dispatch_duration_seconds_count{sink=\"console\"} 1"));
        upkeep.abort();
    }

    #[test]
    fn test_verbosity_raises_level() {
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(build_filter("warn", 0).to_string(), "warn");
            assert_eq!(build_filter("warn", 1).to_string(), "debug");
            assert_eq!(build_filter("warn", 2).to_string(), "trace");
        }
    }
}
