use async_trait::async_trait;

use super::types::TerminalOutcome;
use crate::error::Result;

/// 运行结束时的外部协作方
///
/// 每次运行最多调用一次，顺序固定：清除选中的历史任务 → 等待刷新历史 → 完成回调。
#[async_trait]
pub trait CompletionHooks: Send + Sync {
    /// 清除“选中的历史任务”，让最新结果可见
    fn clear_selected_task(&self) {}

    /// 刷新历史任务列表；失败只记日志，不回滚终态
    async fn refresh_history(&self) -> Result<()> {
        Ok(())
    }

    fn on_complete(&self, _outcome: &TerminalOutcome) {}
}

/// 不做任何事的默认实现
pub struct NoopHooks;

impl CompletionHooks for NoopHooks {}
