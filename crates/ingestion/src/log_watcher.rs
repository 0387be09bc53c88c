//! 日志文件监听适配器
//!
//! 对每个路径启动一个 tail 任务，按固定间隔轮询：
//! - 默认从文件末尾开始 (同 `tail -f`)，`from_beginning` 时从头读取
//! - 不完整的行缓存到换行符到达
//! - 文件变短或 inode 变化视为截断/轮转，从 0 重新读取
//! - 文件不存在时等待其出现 (只记录一次日志)

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use contracts::LogInputConfig;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::adapter::InputAdapter;
use crate::config::IngestionMetrics;
use crate::error::{QueueError, Result};
use crate::parser::{parse_log_line, LOG_SOURCE};
use crate::queue::QueueProducer;

/// 日志监听适配器
pub struct LogWatcher {
    paths: Vec<PathBuf>,
    poll_interval: Duration,
    from_beginning: bool,
    producer: QueueProducer,
    metrics: Arc<IngestionMetrics>,
}

impl LogWatcher {
    pub fn new(config: &LogInputConfig, producer: QueueProducer) -> Self {
        Self {
            paths: config.paths.clone(),
            poll_interval: config.poll_interval(),
            from_beginning: config.from_beginning,
            producer,
            metrics: Arc::new(IngestionMetrics::new(LOG_SOURCE)),
        }
    }

    /// 共享的 ingestion 指标
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl InputAdapter for LogWatcher {
    fn name(&self) -> &'static str {
        LOG_SOURCE
    }

    async fn run(self, shutdown: CancellationToken) -> Result<()> {
        if self.paths.is_empty() {
            warn!("Log watcher has no paths configured");
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for path in self.paths {
            let tail = FileTail::new(path, self.from_beginning);
            tasks.spawn(tail_loop(
                tail,
                self.poll_interval,
                self.producer.clone(),
                Arc::clone(&self.metrics),
                shutdown.clone(),
            ));
        }

        info!(
            files = tasks.len(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Log watcher started"
        );

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Tail task failed");
            }
        }

        info!(snapshot = ?self.metrics.snapshot(), "Log watcher stopped");
        Ok(())
    }
}

#[instrument(name = "tail", skip_all, fields(path = %tail.path.display()))]
async fn tail_loop(
    mut tail: FileTail,
    poll_interval: Duration,
    producer: QueueProducer,
    metrics: Arc<IngestionMetrics>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let lines = match tail.poll().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "Failed to read log file");
                continue;
            }
        };

        for line in lines {
            if let Err(QueueError::Closed) = forward_line(&line, &producer, &metrics).await {
                debug!("Queue closed, stopping tail");
                return;
            }
        }
    }
}

/// 解析一行并入队；解析失败记录后跳过
async fn forward_line(
    line: &str,
    producer: &QueueProducer,
    metrics: &IngestionMetrics,
) -> std::result::Result<(), QueueError> {
    let message = match parse_log_line(line) {
        Ok(Some(message)) => message,
        Ok(None) => return Ok(()),
        Err(e) => {
            metrics.record_parse_error();
            warn!(error = %e, "Skipping unparsable line");
            return Ok(());
        }
    };

    metrics.record_received(1);
    match producer.enqueue(message).await {
        Ok(()) => {
            metrics.record_enqueued();
            Ok(())
        }
        Err(e) => {
            metrics.record_rejected();
            warn!(error = %e, "Dropped log metric, enqueue failed");
            Err(e)
        }
    }
}

/// 单个文件的读取位置
#[derive(Debug)]
pub(crate) struct FileTail {
    path: PathBuf,
    from_beginning: bool,
    offset: u64,
    file_id: Option<u64>,
    partial: Vec<u8>,
    initialized: bool,
    waiting: bool,
}

impl FileTail {
    pub(crate) fn new(path: PathBuf, from_beginning: bool) -> Self {
        Self {
            path,
            from_beginning,
            offset: 0,
            file_id: None,
            partial: Vec::new(),
            initialized: false,
            waiting: false,
        }
    }

    /// 读取自上次以来新增的完整行
    pub(crate) async fn poll(&mut self) -> std::io::Result<Vec<String>> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !self.waiting {
                    info!(path = %self.path.display(), "Waiting for log file to appear");
                    self.waiting = true;
                }
                // 之后出现的文件视为新文件，从头读取
                self.initialized = true;
                self.reset(None);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if self.waiting {
            info!(path = %self.path.display(), "Log file appeared");
            self.waiting = false;
        }

        let len = metadata.len();
        let file_id = file_id(&metadata);

        if !self.initialized {
            self.initialized = true;
            self.file_id = file_id;
            self.offset = if self.from_beginning { 0 } else { len };
        } else if len < self.offset || (self.file_id.is_some() && file_id != self.file_id) {
            info!(path = %self.path.display(), "Log file truncated or rotated, rereading");
            self.reset(file_id);
        } else if self.file_id.is_none() {
            self.file_id = file_id;
        }

        if len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut chunk = Vec::with_capacity((len - self.offset) as usize);
        file.read_to_end(&mut chunk).await?;
        self.offset += chunk.len() as u64;
        self.partial.extend_from_slice(&chunk);

        Ok(self.drain_lines())
    }

    fn reset(&mut self, file_id: Option<u64>) {
        self.offset = 0;
        self.file_id = file_id;
        self.partial.clear();
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }
}

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackpressurePolicy;
    use crate::queue::MetricQueue;
    use std::io::Write;
    use std::path::Path;

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[tokio::test]
    async fn test_starts_at_end_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "old 1\n");

        let mut tail = FileTail::new(path.clone(), false);
        assert!(tail.poll().await.unwrap().is_empty());

        append(&path, "new 2\n");
        assert_eq!(tail.poll().await.unwrap(), ["new 2"]);
    }

    #[tokio::test]
    async fn test_from_beginning_reads_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "a 1\nb 2\n");

        let mut tail = FileTail::new(path, true);
        assert_eq!(tail.poll().await.unwrap(), ["a 1", "b 2"]);
    }

    #[tokio::test]
    async fn test_partial_line_buffered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "");

        let mut tail = FileTail::new(path.clone(), false);
        tail.poll().await.unwrap();

        append(&path, "cpu 1");
        assert!(tail.poll().await.unwrap().is_empty());

        append(&path, "2 host=a\r\n");
        assert_eq!(tail.poll().await.unwrap(), ["cpu 12 host=a"]);
    }

    #[tokio::test]
    async fn test_truncation_rereads_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "a 1\nb 2\n");

        let mut tail = FileTail::new(path.clone(), true);
        assert_eq!(tail.poll().await.unwrap().len(), 2);

        std::fs::write(&path, "c 3\n").unwrap();
        assert_eq!(tail.poll().await.unwrap(), ["c 3"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_waited_for() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.log");

        let mut tail = FileTail::new(path.clone(), false);
        assert!(tail.poll().await.unwrap().is_empty());

        append(&path, "late 1\n");
        assert_eq!(tail.poll().await.unwrap(), ["late 1"]);
    }

    #[tokio::test]
    async fn test_watcher_enqueues_and_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.log");
        let second = dir.path().join("two.log");
        append(&first, "a 1\nthis is garbage\n\nb 2 env=test\n");
        append(&second, r#"{"name":"c","value":3}"#);
        append(&second, "\n");

        let config = LogInputConfig {
            enabled: true,
            paths: vec![first, second],
            poll_interval_ms: 10,
            from_beginning: true,
        };
        let (producer, consumer) = MetricQueue::bounded(16, BackpressurePolicy::Block);
        let watcher = LogWatcher::new(&config, producer);
        let metrics = watcher.metrics();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(shutdown.clone()));

        let mut names = Vec::new();
        for _ in 0..3 {
            let message = tokio::time::timeout(Duration::from_secs(2), consumer.dequeue())
                .await
                .unwrap()
                .unwrap();
            names.push(message.name);
        }
        names.sort();
        assert_eq!(names, ["a", "b", "c"]);

        shutdown.cancel();
        handle.await.unwrap().unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.messages_enqueued, 3);
        assert_eq!(snap.parse_errors, 1);
    }
}
