use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::WarningMap;
use crate::event::ExecutionEvent;
use crate::metrics::WorkflowMetrics;
use crate::state::{ExecutionStatus, NodeStatusMap, RunState};
use crate::tokens::TokenCostMap;

/// 会话内单调递增的运行标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// 终态事件携带的结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TerminalOutcome {
    Completed,
    Failed { error: Option<String> },
}

impl TerminalOutcome {
    /// 只有 `complete` 事件是终态；`data.status == "error"` 表示失败
    pub fn from_event(event: &ExecutionEvent) -> Option<Self> {
        if !event.kind.is_terminal() {
            return None;
        }
        if event.is_error_status() {
            Some(TerminalOutcome::Failed {
                error: event.error_message(),
            })
        } else {
            Some(TerminalOutcome::Completed)
        }
    }

    pub fn state(&self) -> RunState {
        match self {
            TerminalOutcome::Completed => RunState::Completed,
            TerminalOutcome::Failed { .. } => RunState::Failed,
        }
    }
}

/// 单个事件的处理结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub appended: bool,
    pub token_costs_changed: bool,
    pub terminal: Option<TerminalOutcome>,
}

/// 会话所有只读视图的快照
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub workflow_id: Option<String>,
    pub task_id: Option<String>,
    pub run_id: Option<RunId>,
    pub status: ExecutionStatus,
    pub metrics: WorkflowMetrics,
    pub warnings: WarningMap,
    pub token_costs: TokenCostMap,
    pub node_statuses: NodeStatusMap,
}
