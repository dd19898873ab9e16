use std::collections::HashSet;

use tracing::debug;

use super::types::ExecutionEvent;

/// 当前运行的只追加事件日志
///
/// 顺序由传输层保证，这里从不重排。带事件 ID 的重复投递会被丢弃。
#[derive(Clone, Debug)]
pub struct EventLog {
    events: Vec<ExecutionEvent>,
    seen_ids: HashSet<String>,
    dedupe_ids: bool,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            seen_ids: HashSet::new(),
            dedupe_ids: true,
        }
    }

    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_ids = enabled;
        self
    }

    /// 追加事件，返回是否真正写入
    pub fn append(&mut self, event: ExecutionEvent) -> bool {
        if self.dedupe_ids {
            if let Some(id) = event.event_id() {
                if !self.seen_ids.insert(id.clone()) {
                    debug!(event_id = %id, kind = %event.kind, "dropping re-delivered event");
                    return false;
                }
            }
        }
        self.events.push(event);
        true
    }

    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    pub fn latest(&self) -> Option<&ExecutionEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.seen_ids.clear();
    }
}
