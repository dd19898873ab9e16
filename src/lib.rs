pub mod config;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod metrics;
pub mod runtime;
pub mod state;
pub mod tokens;
pub mod utils;

pub use config::{DiagnosticsConfig, EnvConfig, TelemetryConfig};
pub use diagnostics::{
    analyze, DiagnosticsAnalyzer, NodeWarning, WarningKind, WarningMap, WarningSeverity,
    UNKNOWN_NODE,
};
pub use error::{Result, TelemetryError};
pub use event::{parse_json_lines, parse_timestamp, EventKind, EventLog, ExecutionEvent};
pub use metrics::{compute, format_duration, WorkflowMetrics};
pub use runtime::{
    detect_completion, CompletionCheck, CompletionDetector, CompletionHooks, IngestReport,
    NoopHooks, RunId, TelemetrySession, TelemetrySnapshot, TerminalOutcome,
};
#[cfg(feature = "redis-store")]
pub use state::RedisStore;
pub use state::{
    ExecutionStatus, FileStore, KeyValueStore, MemoryStore, NodeExecutionStatus, NodeRunStatus,
    NodeStatusMap, NodeStatusTracker, RunState, RunStatusStore,
};
pub use tokens::{
    apply_cost, fold, NodeTokenCost, SharedTokenCosts, TokenCostAggregator, TokenCostMap,
    TokenCostPersistence,
};
pub use utils::logging;
