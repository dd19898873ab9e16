use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// 状态机允许的迁移
    pub fn can_transition_to(&self, to: RunState) -> bool {
        matches!(
            (self, to),
            (_, RunState::Running)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Failed)
                | (RunState::Running, RunState::Idle)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对外可见的运行状态
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<String>,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 运行状态单元
///
/// 唯一可写入 `state` 的地方：开始运行、终态迁移、用户停止。
/// 订阅者通过 `watch` 通道在每次被接受的迁移后收到通知。
pub struct RunStatusStore {
    sender: watch::Sender<ExecutionStatus>,
}

impl Default for RunStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatusStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ExecutionStatus::default());
        Self { sender }
    }

    pub fn current(&self) -> ExecutionStatus {
        self.sender.borrow().clone()
    }

    pub fn state(&self) -> RunState {
        self.sender.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionStatus> {
        self.sender.subscribe()
    }

    /// 开始新的运行，任意状态都可进入 `running`
    pub fn start(&self) {
        let previous = self.state();
        if previous == RunState::Running {
            warn!("starting a new run while another run is still active");
        }
        self.sender.send_modify(|status| {
            *status = ExecutionStatus {
                state: RunState::Running,
                start_time: Some(Utc::now()),
                ..ExecutionStatus::default()
            };
        });
        info!(from = %previous, "run started");
    }

    /// 成功终态；不在 `running` 时为空操作
    pub fn complete(&self) -> bool {
        self.finish(RunState::Completed, None)
    }

    /// 失败终态；不在 `running` 时为空操作
    pub fn fail(&self, error: Option<String>) -> bool {
        self.finish(RunState::Failed, error)
    }

    /// 用户停止：回到 `idle` 并清空当前节点、进度和时长
    pub fn stop(&self) -> bool {
        match self.try_transition(RunState::Idle) {
            Ok(()) => {
                self.sender.send_modify(|status| {
                    status.state = RunState::Idle;
                    status.current_node = None;
                    status.progress = 0;
                    status.duration_ms = None;
                });
                info!("run stopped by user");
                true
            }
            Err(error) => {
                debug!(%error, "ignoring stop request");
                false
            }
        }
    }

    /// 切换工作流时整体拆除，不属于运行内的状态迁移
    pub fn reset(&self) {
        self.sender.send_if_modified(|status| {
            if *status == ExecutionStatus::default() {
                return false;
            }
            *status = ExecutionStatus::default();
            true
        });
    }

    /// 外部“当前节点变化”信号，只在运行中生效
    pub fn set_current_node(&self, node: Option<String>) -> bool {
        self.sender.send_if_modified(|status| {
            if status.state != RunState::Running || status.current_node == node {
                return false;
            }
            status.current_node = node;
            true
        })
    }

    fn finish(&self, to: RunState, error: Option<String>) -> bool {
        if let Err(error) = self.try_transition(to) {
            debug!(%error, "ignoring terminal transition");
            return false;
        }

        let now = Utc::now();
        self.sender.send_modify(|status| {
            status.state = to;
            if to == RunState::Completed {
                status.progress = 100;
            }
            status.duration_ms = status
                .start_time
                .map(|start| (now - start).num_milliseconds().max(0) as u64);
            status.error = error;
        });
        info!(state = %to, "run finished");
        true
    }

    fn try_transition(&self, to: RunState) -> Result<()> {
        let from = self.state();
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(TelemetryError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}
