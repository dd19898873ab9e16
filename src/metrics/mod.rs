// 运行聚合指标模块

mod calculator;
mod duration;

pub use calculator::{compute, WorkflowMetrics};
pub use duration::{elapsed_between, format_duration};
