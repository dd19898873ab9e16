use std::path::Path;

use serde::{Deserialize, Serialize};

use super::env::EnvConfig;
use crate::error::{Result, TelemetryError};

/// 诊断阈值配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// 单个节点 `on_agent_action` 次数超过该值时告警
    pub agent_iteration_threshold: usize,
    /// 同一节点重复调用同一工具达到该次数时告警
    pub tool_repeat_threshold: usize,
    /// 循环检测窗口（最近 N 次 agent 动作）
    pub loop_window: usize,
    /// 窗口内不同 agent 数不超过该值视为循环
    pub loop_max_unique_agents: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            agent_iteration_threshold: 15,
            tool_repeat_threshold: 10,
            loop_window: 10,
            loop_max_unique_agents: 2,
        }
    }
}

/// 遥测引擎配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub diagnostics: DiagnosticsConfig,
    /// 持久化键前缀，键格式为 `{prefix}-{workflow_id}-token-costs`
    pub persistence_prefix: String,
    /// 按事件 ID 丢弃重复投递
    pub dedupe_event_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            diagnostics: DiagnosticsConfig::default(),
            persistence_prefix: "workflow".to_string(),
            dedupe_event_ids: true,
        }
    }
}

impl TelemetryConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| TelemetryError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// 用环境变量覆盖配置
    ///
    /// 支持：
    /// - FLOWPULSE_AGENT_ITERATION_THRESHOLD
    /// - FLOWPULSE_TOOL_REPEAT_THRESHOLD
    /// - FLOWPULSE_LOOP_WINDOW
    /// - FLOWPULSE_PERSISTENCE_PREFIX
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(value) = EnvConfig::get_usize("FLOWPULSE_AGENT_ITERATION_THRESHOLD")? {
            self.diagnostics.agent_iteration_threshold = value;
        }
        if let Some(value) = EnvConfig::get_usize("FLOWPULSE_TOOL_REPEAT_THRESHOLD")? {
            self.diagnostics.tool_repeat_threshold = value;
        }
        if let Some(value) = EnvConfig::get_usize("FLOWPULSE_LOOP_WINDOW")? {
            self.diagnostics.loop_window = value;
        }
        if let Some(prefix) = EnvConfig::get_env_optional("FLOWPULSE_PERSISTENCE_PREFIX") {
            self.persistence_prefix = prefix;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.persistence_prefix.trim().is_empty() {
            return Err(TelemetryError::Config(
                "persistence_prefix must not be empty".into(),
            ));
        }
        if self.diagnostics.loop_window == 0 {
            return Err(TelemetryError::Config("loop_window must be positive".into()));
        }
        Ok(())
    }
}
