use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 无法确定节点时使用的分组键
pub const UNKNOWN_NODE: &str = "unknown";

/// 按节点分组的告警
pub type WarningMap = BTreeMap<String, Vec<NodeWarning>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ExecutionError,
    NodeFailed,
    RecursionLimit,
    ExcessiveIterations,
    ToolLoop,
    ExecutionLoop,
    MissingExit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub severity: WarningSeverity,
    pub message: String,
}

impl NodeWarning {
    pub fn warning(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: WarningSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn error(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: WarningSeverity::Error,
            message: message.into(),
        }
    }
}
