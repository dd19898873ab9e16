// 执行事件模块

mod log;
mod time;
mod types;

pub use log::EventLog;
pub use time::parse_timestamp;
pub use types::{parse_json_lines, EventKind, ExecutionEvent};
