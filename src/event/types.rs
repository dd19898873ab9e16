use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TelemetryError};
use crate::tokens::NodeTokenCost;

use super::time::parse_timestamp;

/// 事件类型
///
/// 未识别的类型原样保留在 `Other` 中，只计入事件总数。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    ChainStart,
    ChainEnd,
    ToolStart,
    ToolEnd,
    AgentAction,
    LlmEnd,
    NodeCompleted,
    Error,
    Complete,
    RecursionLimitHit,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ChainStart => "on_chain_start",
            EventKind::ChainEnd => "on_chain_end",
            EventKind::ToolStart => "on_tool_start",
            EventKind::ToolEnd => "on_tool_end",
            EventKind::AgentAction => "on_agent_action",
            EventKind::LlmEnd => "on_llm_end",
            EventKind::NodeCompleted => "node_completed",
            EventKind::Error => "error",
            EventKind::Complete => "complete",
            EventKind::RecursionLimitHit => "recursion_limit_hit",
            EventKind::Other(name) => name.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete)
    }
}

impl Default for EventKind {
    fn default() -> Self {
        EventKind::Other(String::new())
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "on_chain_start" => EventKind::ChainStart,
            "on_chain_end" => EventKind::ChainEnd,
            "on_tool_start" => EventKind::ToolStart,
            "on_tool_end" => EventKind::ToolEnd,
            "on_agent_action" => EventKind::AgentAction,
            "on_llm_end" => EventKind::LlmEnd,
            "node_completed" => EventKind::NodeCompleted,
            "error" => EventKind::Error,
            "complete" => EventKind::Complete,
            "recursion_limit_hit" => EventKind::RecursionLimitHit,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        EventKind::from(value.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 工作流执行事件
///
/// `data` 保持原始 JSON，按需通过访问器读取；字段缺失或类型不符时访问器返回 `None`，
/// 调用方据此跳过专门视图的更新。
/// 顶层字段类型不符时按缺失处理，只有非 JSON 对象才算无法解析。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: EventKind,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ExecutionEvent {
    pub fn new(kind: impl Into<EventKind>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: None,
            id: None,
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| TelemetryError::MalformedEvent(e.to_string()))?;
        Self::from_value(value)
    }

    /// 从任意 JSON 值构造事件，要求是对象
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(TelemetryError::MalformedEvent(format!(
                "expected a JSON object, found {}",
                json_type_name(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| TelemetryError::MalformedEvent(e.to_string()))
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    fn non_empty_field(&self, key: &str) -> Option<&str> {
        self.str_field(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn agent_label(&self) -> Option<&str> {
        self.non_empty_field("agent_label")
    }

    /// 节点标识：`nodeId` → `node_id` → `agent_label`
    pub fn node_id(&self) -> Option<&str> {
        self.non_empty_field("nodeId")
            .or_else(|| self.non_empty_field("node_id"))
            .or_else(|| self.agent_label())
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.non_empty_field("tool_name")
            .or_else(|| self.non_empty_field("name"))
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.non_empty_field("agent_name")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    pub fn is_error_status(&self) -> bool {
        self.status() == Some("error")
    }

    pub fn error_message(&self) -> Option<String> {
        match self.data.get("error")? {
            Value::Null => None,
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn tokens_used(&self) -> Option<u64> {
        let value = self.data.get("tokens_used")?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
    }

    pub fn token_cost(&self) -> Option<NodeTokenCost> {
        let raw = self.data.get("tokenCost")?;
        match serde_json::from_value(raw.clone()) {
            Ok(cost) => Some(cost),
            Err(error) => {
                debug!(kind = %self.kind, %error, "ignoring unparseable tokenCost payload");
                None
            }
        }
    }

    /// 传输层事件 ID，用于同一次运行内去重
    ///
    /// 传输层用 `0` 表示“没有 ID”，与缺失等同。
    pub fn event_id(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref().filter(|id| is_real_id(id)) {
            return Some(id.to_string());
        }
        match self.data.get("event_id")? {
            Value::String(id) if is_real_id(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()).filter(|id| is_real_id(id)),
            _ => None,
        }
    }

    pub fn timestamp_str(&self) -> Option<&str> {
        self.timestamp
            .as_deref()
            .or_else(|| self.str_field("timestamp"))
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp_str().and_then(parse_timestamp)
    }
}

fn is_real_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty() && id != "0"
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn lenient_kind<'de, D>(deserializer: D) -> std::result::Result<EventKind, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(name) => EventKind::from(name),
        _ => EventKind::default(),
    })
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// SSE 帧里的 ID 是整数，统一转成字符串
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

/// 解析 JSON Lines 格式的事件日志，空行忽略
pub fn parse_json_lines(raw: &str) -> Result<Vec<ExecutionEvent>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            ExecutionEvent::from_json_str(line).map_err(|e| {
                TelemetryError::MalformedEvent(format!("line {}: {}", index + 1, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_types_round_trip_verbatim() {
        let event = ExecutionEvent::from_json_str(r#"{"type":"subagent_start"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Other("subagent_start".into()));
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["type"], "subagent_start");
    }

    #[test]
    fn missing_type_is_tolerated() {
        let event = ExecutionEvent::from_json_str(r#"{"data":{"foo":1}}"#).unwrap();
        assert_eq!(event.kind, EventKind::Other(String::new()));
    }

    #[test]
    fn node_id_falls_back_to_agent_label() {
        let event = ExecutionEvent::new("error").with_data(json!({"agent_label": "Writer"}));
        assert_eq!(event.node_id(), Some("Writer"));

        let event = ExecutionEvent::new("error")
            .with_data(json!({"node_id": "node-7", "agent_label": "Writer"}));
        assert_eq!(event.node_id(), Some("node-7"));
    }

    #[test]
    fn timestamp_is_read_from_data_when_missing() {
        let event = ExecutionEvent::new("on_tool_start")
            .with_data(json!({"timestamp": "2025-01-01T00:00:00"}));
        assert!(event.parsed_timestamp().is_some());
    }

    #[test]
    fn malformed_token_cost_is_skipped() {
        let event = ExecutionEvent::new("node_completed")
            .with_data(json!({"agent_label": "A", "tokenCost": {"totalTokens": "lots"}}));
        assert!(event.token_cost().is_none());
    }

    #[test]
    fn mistyped_top_level_fields_are_tolerated() {
        let event = ExecutionEvent::from_json_str(r#"{"type":"on_tool_start","id":7}"#).unwrap();
        assert_eq!(event.kind, EventKind::ToolStart);
        assert_eq!(event.event_id().as_deref(), Some("7"));

        let event =
            ExecutionEvent::from_json_str(r#"{"type":null,"timestamp":1714000000}"#).unwrap();
        assert_eq!(event.kind, EventKind::Other(String::new()));
        assert!(event.timestamp.is_none());
        assert!(event.parsed_timestamp().is_none());
    }

    #[test]
    fn non_object_events_are_rejected() {
        assert!(ExecutionEvent::from_json_str(r#"["complete"]"#).is_err());
        assert!(ExecutionEvent::from_json_str("42").is_err());
    }

    #[test]
    fn zero_event_id_means_no_id() {
        let event = ExecutionEvent::new("complete").with_data(json!({"event_id": 0}));
        assert!(event.event_id().is_none());
        let event = ExecutionEvent::from_json_str(r#"{"type":"complete","id":0}"#).unwrap();
        assert!(event.event_id().is_none());
        let event = ExecutionEvent::new("complete").with_data(json!({"event_id": 12}));
        assert_eq!(event.event_id().as_deref(), Some("12"));
    }

    #[test]
    fn json_lines_keep_mistyped_events() {
        let raw = "{\"type\":\"on_chain_start\"}\n{\"type\":\"on_tool_start\",\"id\":7,\"timestamp\":1714000000}\n{\"type\":\"complete\"}\n";
        let events = parse_json_lines(raw).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind, EventKind::ToolStart);
    }

    #[test]
    fn json_lines_report_line_numbers() {
        let raw = "{\"type\":\"complete\"}\n\nnot json\n";
        let err = parse_json_lines(raw).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
