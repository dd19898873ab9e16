// 状态管理模块

mod node_status;
mod status;
mod store;

pub use node_status::{NodeExecutionStatus, NodeRunStatus, NodeStatusMap, NodeStatusTracker};
pub use status::{ExecutionStatus, RunState, RunStatusStore};
#[cfg(feature = "redis-store")]
pub use store::redis::RedisStore;
pub use store::{FileStore, KeyValueStore, MemoryStore};
