//! Ingestion 错误类型

use thiserror::Error;

/// 入队失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// 队列已满 (fail-fast 或等待超时)
    #[error("queue full (capacity {capacity})")]
    Full {
        /// 队列容量
        capacity: usize,
    },

    /// 队列已关闭 (进程正在退出)
    #[error("queue closed")]
    Closed,
}

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 输入数据解析失败
    #[error("failed to parse input from {source_name}: {message}")]
    ParseFailed {
        /// 输入来源 (http / log_watcher)
        source_name: String,
        /// 错误消息
        message: String,
    },

    /// 入队失败
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// 监听地址绑定失败
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// 监听地址
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS 证书/私钥加载失败
    #[error("tls setup failed: {message}")]
    Tls {
        /// 错误消息
        message: String,
    },

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn parse_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls {
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
