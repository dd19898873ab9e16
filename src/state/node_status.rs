use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, ExecutionEvent};
use crate::tokens::NodeTokenCost;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// 以节点标签为键的执行状态
pub type NodeStatusMap = BTreeMap<String, NodeRunStatus>;

/// 传输层节点状态通道推送的更新
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionStatus {
    pub label: String,
    pub status: NodeRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_cost: Option<NodeTokenCost>,
}

impl NodeExecutionStatus {
    pub fn new(label: impl Into<String>, status: NodeRunStatus) -> Self {
        Self {
            label: label.into(),
            status,
            token_cost: None,
        }
    }

    pub fn with_token_cost(mut self, cost: NodeTokenCost) -> Self {
        self.token_cost = Some(cost);
        self
    }
}

/// 节点执行状态视图
#[derive(Clone, Debug, Default)]
pub struct NodeStatusTracker {
    statuses: NodeStatusMap,
}

impl NodeStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> &NodeStatusMap {
        &self.statuses
    }

    pub fn status_of(&self, label: &str) -> NodeRunStatus {
        self.statuses.get(label).copied().unwrap_or_default()
    }

    /// 根据事件推进节点状态，返回是否有变化
    pub fn observe(&mut self, event: &ExecutionEvent) -> bool {
        let Some(label) = event.agent_label().or_else(|| event.node_id()) else {
            return false;
        };
        let current = self.status_of(label);
        let next = match event.kind {
            EventKind::ChainStart => NodeRunStatus::Running,
            EventKind::ChainEnd if current == NodeRunStatus::Failed => return false,
            EventKind::ChainEnd => NodeRunStatus::Completed,
            EventKind::NodeCompleted if event.is_error_status() => NodeRunStatus::Failed,
            EventKind::NodeCompleted => NodeRunStatus::Completed,
            EventKind::Error => NodeRunStatus::Failed,
            _ => return false,
        };
        self.set(label, next)
    }

    pub fn apply(&mut self, update: &NodeExecutionStatus) -> bool {
        if update.label.trim().is_empty() {
            return false;
        }
        self.set(&update.label, update.status)
    }

    pub fn reset(&mut self) {
        self.statuses.clear();
    }

    fn set(&mut self, label: &str, status: NodeRunStatus) -> bool {
        if self.statuses.get(label) == Some(&status) {
            return false;
        }
        self.statuses.insert(label.to_string(), status);
        true
    }
}
