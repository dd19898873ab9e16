// 执行诊断模块：从完整事件历史推导每个节点的告警

mod analyzer;
mod types;

pub use analyzer::{analyze, DiagnosticsAnalyzer};
pub use types::{NodeWarning, WarningKind, WarningMap, WarningSeverity, UNKNOWN_NODE};
