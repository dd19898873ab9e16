use crate::error::{Result, TelemetryError};
use std::env;

/// 环境变量配置管理
pub struct EnvConfig;

impl EnvConfig {
    /// 从环境变量获取值
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| {
            TelemetryError::Config(format!("environment variable `{}` is not set", key))
        })
    }

    /// 获取可选的环境变量
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }

    /// 获取可选的整数环境变量，格式错误时报错
    pub fn get_usize(key: &str) -> Result<Option<usize>> {
        match Self::get_env_optional(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
                TelemetryError::Config(format!("`{}` must be a non-negative integer, got `{}`", key, raw))
            }),
        }
    }
}
