//! Relay 指标收集模块
//!
//! 通过 `metrics` facade 记录，由安装的 Prometheus recorder 导出。
//! 未安装 recorder 时 (如单元测试) 所有记录均为 no-op。

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一次 HTTP 请求
pub fn record_http_request(method: &str, path: &str, status: u16, latency: Duration) {
    counter!(
        "penguin_http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "penguin_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(latency.as_secs_f64());
}

/// 记录成功入队的消息
pub fn record_message_enqueued(source: &str) {
    counter!(
        "penguin_messages_enqueued_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录被拒绝的入队 (队列满 / 已关闭)
pub fn record_enqueue_rejected(source: &str) {
    counter!(
        "penguin_enqueue_rejected_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录输入解析失败
pub fn record_parse_error(source: &str) {
    counter!(
        "penguin_parse_errors_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("penguin_queue_depth").set(depth as f64);
}

/// 单次 sink 调用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Failure,
    Panic,
}

impl DispatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Panic => "panic",
        }
    }
}

/// 记录一次 sink 分发
pub fn record_dispatch(sink_name: &str, outcome: DispatchOutcome, messages: usize, elapsed: Duration) {
    counter!(
        "penguin_dispatch_total",
        "sink" => sink_name.to_string(),
        "status" => outcome.as_str()
    )
    .increment(1);

    if outcome == DispatchOutcome::Success {
        counter!(
            "penguin_dispatch_messages_total",
            "sink" => sink_name.to_string()
        )
        .increment(messages as u64);
    }

    histogram!(
        "penguin_dispatch_duration_seconds",
        "sink" => sink_name.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
