use serde::{Deserialize, Serialize};

use super::duration::{elapsed_between, format_duration};
use crate::event::{EventKind, ExecutionEvent};

/// 一次运行的聚合指标快照
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetrics {
    pub total_events: usize,
    pub chain_ends: usize,
    pub tool_calls: usize,
    pub agent_actions: usize,
    pub llm_calls: usize,
    pub total_tokens: u64,
    pub errors: usize,
    pub duration_secs: u64,
    pub duration: String,
}

impl Default for WorkflowMetrics {
    fn default() -> Self {
        compute(&[])
    }
}

/// 从完整事件历史计算指标
///
/// 时长取首尾事件时间戳之差而不是当前时间，实时流和历史回放结果一致。
/// token 只累加 `on_llm_end` 的 `tokens_used`，与节点成本表是两套口径。
pub fn compute(events: &[ExecutionEvent]) -> WorkflowMetrics {
    let mut metrics = WorkflowMetrics {
        total_events: events.len(),
        chain_ends: 0,
        tool_calls: 0,
        agent_actions: 0,
        llm_calls: 0,
        total_tokens: 0,
        errors: 0,
        duration_secs: 0,
        duration: String::new(),
    };

    for event in events {
        match event.kind {
            EventKind::ChainEnd => metrics.chain_ends += 1,
            EventKind::ToolStart => metrics.tool_calls += 1,
            EventKind::AgentAction => metrics.agent_actions += 1,
            EventKind::LlmEnd => {
                metrics.llm_calls += 1;
                metrics.total_tokens = metrics
                    .total_tokens
                    .saturating_add(event.tokens_used().unwrap_or(0));
            }
            EventKind::Error => metrics.errors += 1,
            _ => {}
        }
    }

    let first = events.iter().find_map(ExecutionEvent::parsed_timestamp);
    let last = events.iter().rev().find_map(ExecutionEvent::parsed_timestamp);
    if let (Some(first), Some(last)) = (first, last) {
        metrics.duration_secs = elapsed_between(first, last);
    }
    metrics.duration = format_duration(metrics.duration_secs);
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(kind: &str, ts: &str) -> ExecutionEvent {
        ExecutionEvent::new(kind).with_timestamp(ts)
    }

    #[test]
    fn counts_each_recognized_kind() {
        let events = vec![
            ExecutionEvent::new("on_chain_end"),
            ExecutionEvent::new("on_tool_start"),
            ExecutionEvent::new("on_tool_start"),
            ExecutionEvent::new("on_agent_action"),
            ExecutionEvent::new("on_llm_end").with_data(json!({"tokens_used": 120})),
            ExecutionEvent::new("on_llm_end").with_data(json!({"tokens_used": "n/a"})),
            ExecutionEvent::new("error"),
            ExecutionEvent::new("subagent_start"),
            ExecutionEvent::new("node_completed")
                .with_data(json!({"tokenCost": {"totalTokens": 999}})),
        ];
        let metrics = compute(&events);
        assert_eq!(metrics.total_events, 9);
        assert_eq!(metrics.chain_ends, 1);
        assert_eq!(metrics.tool_calls, 2);
        assert_eq!(metrics.agent_actions, 1);
        assert_eq!(metrics.llm_calls, 2);
        assert_eq!(metrics.total_tokens, 120);
        assert_eq!(metrics.errors, 1);
    }

    #[test]
    fn duration_uses_first_and_last_timestamps() {
        let events = vec![
            at("on_chain_start", "2025-05-01T10:00:00Z"),
            ExecutionEvent::new("on_tool_start"),
            at("complete", "2025-05-01T10:01:35Z"),
        ];
        assert_eq!(compute(&events).duration, "1m 35s");

        let events = vec![
            at("on_chain_start", "2025-05-01T10:00:00"),
            at("complete", "2025-05-01T10:00:45"),
        ];
        assert_eq!(compute(&events).duration, "45s");
    }

    #[test]
    fn repeated_computation_is_stable() {
        let events = vec![
            at("on_llm_end", "2025-05-01T10:00:00Z").with_data(json!({"tokens_used": 7})),
            at("complete", "2025-05-01T10:00:03Z"),
        ];
        assert_eq!(compute(&events), compute(&events));
    }

    #[test]
    fn token_sum_saturates_instead_of_overflowing() {
        let huge = u64::MAX / 2 + 1;
        let events = vec![
            ExecutionEvent::new("on_llm_end").with_data(json!({"tokens_used": huge})),
            ExecutionEvent::new("on_llm_end").with_data(json!({"tokens_used": huge})),
        ];
        let metrics = compute(&events);
        assert_eq!(metrics.llm_calls, 2);
        assert_eq!(metrics.total_tokens, u64::MAX);
    }

    #[test]
    fn empty_history_has_zero_duration() {
        let metrics = WorkflowMetrics::default();
        assert_eq!(metrics.total_events, 0);
        assert_eq!(metrics.duration, "0s");
    }
}
