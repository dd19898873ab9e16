// 运行时：终态检测、外部协作方与事件分发会话

mod completion;
mod hooks;
mod session;
mod types;

pub use completion::{detect_completion, CompletionCheck, CompletionDetector};
pub use hooks::{CompletionHooks, NoopHooks};
pub use session::TelemetrySession;
pub use types::{IngestReport, RunId, TelemetrySnapshot, TerminalOutcome};
