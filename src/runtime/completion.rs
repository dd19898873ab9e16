use crate::event::ExecutionEvent;

use super::types::{RunId, TerminalOutcome};

/// 一次终态检查的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionCheck {
    pub should_handle: bool,
    pub next_has_handled: bool,
}

/// 只检查最后一个事件；已处理过则永远不再触发
///
/// 新运行开始时由宿主负责把 `has_handled` 清零。
pub fn detect_completion(events: &[ExecutionEvent], has_handled: bool) -> CompletionCheck {
    if has_handled {
        return CompletionCheck {
            should_handle: false,
            next_has_handled: true,
        };
    }
    let terminal = events.last().is_some_and(|event| event.kind.is_terminal());
    CompletionCheck {
        should_handle: terminal,
        next_has_handled: terminal,
    }
}

/// 按运行标识去重的终态检测器
///
/// 记录最后处理过的运行，而不是一个需要手动复位的布尔值。
#[derive(Clone, Debug, Default)]
pub struct CompletionDetector {
    last_handled: Option<RunId>,
}

impl CompletionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_handled(&self, run: RunId) -> bool {
        self.last_handled.is_some_and(|handled| handled >= run)
    }

    pub fn last_handled(&self) -> Option<RunId> {
        self.last_handled
    }

    /// 首次看到终态事件时返回结果，并在返回前记下该运行已处理
    pub fn observe(&mut self, run: RunId, events: &[ExecutionEvent]) -> Option<TerminalOutcome> {
        let check = detect_completion(events, self.has_handled(run));
        if !check.should_handle {
            return None;
        }
        self.last_handled = Some(run);
        events.last().and_then(TerminalOutcome::from_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete(status: &str) -> ExecutionEvent {
        ExecutionEvent::new("complete").with_data(json!({ "status": status }))
    }

    #[test]
    fn pure_check_only_looks_at_last_event() {
        let events = vec![complete("success"), ExecutionEvent::new("on_tool_start")];
        assert_eq!(
            detect_completion(&events, false),
            CompletionCheck { should_handle: false, next_has_handled: false }
        );
        assert!(detect_completion(&[complete("success")], false).should_handle);
        assert_eq!(
            detect_completion(&[complete("success")], true),
            CompletionCheck { should_handle: false, next_has_handled: true }
        );
        assert!(!detect_completion(&[], false).should_handle);
    }

    #[test]
    fn fires_once_per_run() {
        let mut detector = CompletionDetector::new();
        let mut events = vec![ExecutionEvent::new("on_chain_start")];
        assert!(detector.observe(RunId(1), &events).is_none());

        events.push(complete("success"));
        assert_eq!(detector.observe(RunId(1), &events), Some(TerminalOutcome::Completed));
        events.push(complete("success"));
        assert!(detector.observe(RunId(1), &events).is_none());

        let next_run = vec![complete("error")];
        assert_eq!(
            detector.observe(RunId(2), &next_run),
            Some(TerminalOutcome::Failed { error: None })
        );
        assert!(detector.observe(RunId(1), &events).is_none());
    }

    #[test]
    fn error_events_are_not_terminal() {
        let mut detector = CompletionDetector::new();
        let events = vec![ExecutionEvent::new("error").with_data(json!({"error": "tool failed"}))];
        assert!(detector.observe(RunId(1), &events).is_none());
        assert!(!detector.has_handled(RunId(1)));
    }
}
