// 节点 token 成本统计模块

mod aggregator;
mod cost;
mod persistence;

pub use aggregator::{apply_cost, fold, TokenCostAggregator};
pub use cost::{NodeTokenCost, SharedTokenCosts, TokenCostMap};
pub use persistence::TokenCostPersistence;
