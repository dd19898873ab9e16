use std::sync::Arc;

use tracing::debug;

use super::cost::{NodeTokenCost, SharedTokenCosts, TokenCostMap};
use crate::event::{EventKind, ExecutionEvent};

/// 把单个事件折叠进成本表
///
/// 只处理带非空 `agent_label` 和可解析 `tokenCost` 的 `node_completed` 事件；
/// 其余情况原样返回 `current` 的同一引用。
pub fn fold(current: &SharedTokenCosts, event: &ExecutionEvent) -> SharedTokenCosts {
    if event.kind != EventKind::NodeCompleted {
        return Arc::clone(current);
    }
    let (Some(label), Some(cost)) = (event.agent_label(), event.token_cost()) else {
        return Arc::clone(current);
    };
    apply_cost(current, label, cost)
}

/// 写入某个节点的最新成本快照，`totalTokens` 未变化时不产生新表
pub fn apply_cost(current: &SharedTokenCosts, label: &str, cost: NodeTokenCost) -> SharedTokenCosts {
    if let Some(stored) = current.get(label) {
        if stored.total_tokens == cost.total_tokens {
            return Arc::clone(current);
        }
    }

    debug!(label, total_tokens = cost.total_tokens, "node token cost updated");
    let mut next: TokenCostMap = (**current).clone();
    next.insert(label.to_string(), cost);
    Arc::new(next)
}

/// 持有当前成本表的增量聚合器
#[derive(Clone, Debug, Default)]
pub struct TokenCostAggregator {
    costs: SharedTokenCosts,
}

impl TokenCostAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_costs(costs: TokenCostMap) -> Self {
        Self {
            costs: Arc::new(costs),
        }
    }

    pub fn costs(&self) -> &SharedTokenCosts {
        &self.costs
    }

    /// 折叠事件，返回成本表是否发生变化
    pub fn observe(&mut self, event: &ExecutionEvent) -> bool {
        let next = fold(&self.costs, event);
        self.replace(next)
    }

    /// 应用带成本的节点状态更新，返回成本表是否发生变化
    pub fn observe_update(&mut self, label: &str, cost: NodeTokenCost) -> bool {
        if label.trim().is_empty() {
            return false;
        }
        let next = apply_cost(&self.costs, label, cost);
        self.replace(next)
    }

    pub fn reset(&mut self, costs: TokenCostMap) {
        self.costs = Arc::new(costs);
    }

    fn replace(&mut self, next: SharedTokenCosts) -> bool {
        if Arc::ptr_eq(&next, &self.costs) {
            return false;
        }
        self.costs = next;
        true
    }
}
