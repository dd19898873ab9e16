use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde_json::Value;

use super::types::{NodeWarning, WarningKind, WarningMap, UNKNOWN_NODE};
use crate::config::DiagnosticsConfig;
use crate::event::{EventKind, ExecutionEvent};

/// 使用默认阈值分析事件历史
pub fn analyze(events: &[ExecutionEvent]) -> WarningMap {
    DiagnosticsAnalyzer::default().analyze(events)
}

/// 执行诊断分析器
///
/// 纯函数：每次从完整历史整体重算，不修改输入，单次遍历。
#[derive(Clone, Debug, Default)]
pub struct DiagnosticsAnalyzer {
    config: DiagnosticsConfig,
}

impl DiagnosticsAnalyzer {
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn analyze(&self, events: &[ExecutionEvent]) -> WarningMap {
        let mut warnings = WarningMap::new();
        let mut agent_actions: BTreeMap<String, usize> = BTreeMap::new();
        let mut tool_starts: BTreeMap<(String, String), usize> = BTreeMap::new();
        let window = self.config.loop_window.max(1);
        let mut trail: VecDeque<String> = VecDeque::with_capacity(window);

        for event in events {
            match &event.kind {
                EventKind::Error => {
                    let message = event
                        .error_message()
                        .unwrap_or_else(|| "Unknown error".to_string());
                    push(
                        &mut warnings,
                        node_key(event),
                        NodeWarning::error(WarningKind::ExecutionError, message),
                    );
                }
                EventKind::NodeCompleted if event.is_error_status() => {
                    let message = event
                        .error_message()
                        .unwrap_or_else(|| "Node reported an error status".to_string());
                    push(
                        &mut warnings,
                        node_key(event),
                        NodeWarning::error(WarningKind::NodeFailed, message),
                    );
                }
                EventKind::RecursionLimitHit => {
                    let node = event
                        .agent_name()
                        .or_else(|| event.node_id())
                        .unwrap_or(UNKNOWN_NODE)
                        .to_string();
                    push(
                        &mut warnings,
                        node,
                        NodeWarning::error(WarningKind::RecursionLimit, recursion_message(event)),
                    );
                }
                EventKind::AgentAction => {
                    let Some(node) = event.node_id() else {
                        continue;
                    };
                    *agent_actions.entry(node.to_string()).or_default() += 1;
                    if trail.len() == window {
                        trail.pop_front();
                    }
                    trail.push_back(node.to_string());
                }
                EventKind::ToolStart => {
                    let (Some(node), Some(tool)) = (event.node_id(), event.tool_name()) else {
                        continue;
                    };
                    *tool_starts
                        .entry((node.to_string(), tool.to_string()))
                        .or_default() += 1;
                }
                _ => {}
            }
        }

        for (node, count) in agent_actions {
            if count > self.config.agent_iteration_threshold {
                let message = format!("Agent '{node}' executed {count} times - possible infinite loop");
                push(
                    &mut warnings,
                    node,
                    NodeWarning::warning(WarningKind::ExcessiveIterations, message),
                );
            }
        }

        for ((node, tool), count) in tool_starts {
            if count >= self.config.tool_repeat_threshold.max(1) {
                let message = format!("Tool '{tool}' called {count} times");
                push(&mut warnings, node, NodeWarning::warning(WarningKind::ToolLoop, message));
            }
        }

        self.detect_loop(&trail, window, &mut warnings);
        warnings
    }

    fn detect_loop(&self, trail: &VecDeque<String>, window: usize, warnings: &mut WarningMap) {
        if trail.len() < window {
            return;
        }
        let unique: BTreeSet<&str> = trail.iter().map(String::as_str).collect();
        if unique.len() > self.config.loop_max_unique_agents {
            return;
        }

        let pattern = trail
            .iter()
            .skip(trail.len().saturating_sub(5))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" → ");

        for node in &unique {
            push(
                warnings,
                node.to_string(),
                NodeWarning::warning(
                    WarningKind::ExecutionLoop,
                    format!("Agent execution loop detected: {pattern}"),
                ),
            );
        }

        if let (1, Some(node)) = (unique.len(), unique.first()) {
            push(
                warnings,
                node.to_string(),
                NodeWarning::warning(
                    WarningKind::MissingExit,
                    format!("Node '{node}' executing repeatedly - missing outgoing edge"),
                ),
            );
        }
    }
}

fn node_key(event: &ExecutionEvent) -> String {
    event.node_id().unwrap_or(UNKNOWN_NODE).to_string()
}

fn push(warnings: &mut WarningMap, node: String, warning: NodeWarning) {
    warnings.entry(node).or_default().push(warning);
}

fn recursion_message(event: &ExecutionEvent) -> String {
    let mut message = match event.data.get("iteration_count").and_then(Value::as_u64) {
        Some(count) => format!("Recursion limit reached after {count} iterations"),
        None => "Recursion limit reached".to_string(),
    };
    let issues: Vec<&str> = event
        .data
        .pointer("/diagnostics/detected_issues")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !issues.is_empty() {
        message.push_str(": ");
        message.push_str(&issues.join("; "));
    }
    message
}
