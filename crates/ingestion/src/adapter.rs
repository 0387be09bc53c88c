//! 输入适配器 trait

use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// 输入适配器
///
/// 每种输入源实现此 trait，负责：
/// 1. 接收外部信号 (HTTP 请求 / 日志行)
/// 2. 解析为 `MetricMessage`
/// 3. 入队 (遵循队列背压策略)
///
/// `run` 消费适配器本身，直到 `shutdown` 被取消或输入源结束。
#[trait_variant::make(InputAdapter: Send)]
pub trait LocalInputAdapter {
    /// 适配器名称 (用于日志/指标)
    fn name(&self) -> &'static str;

    /// 运行适配器主循环
    async fn run(self, shutdown: CancellationToken) -> Result<()>;
}
