use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 单个节点的 token 成本快照
///
/// 后端上报的是节点累计值而非增量，因此只做整体替换，不做累加。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeTokenCost {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_string: String,
}

impl NodeTokenCost {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, cost_string: impl Into<String>) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            cost_string: cost_string.into(),
        }
    }
}

/// 以节点标签为键的成本表，序列化为普通 JSON 对象
pub type TokenCostMap = BTreeMap<String, NodeTokenCost>;

/// 共享成本表；未变化时返回同一个 `Arc`，便于宿主用指针比较跳过刷新
pub type SharedTokenCosts = Arc<TokenCostMap>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uses_camel_case_wire_format() {
        let cost = NodeTokenCost::new(100, 50, "$0.01");
        let value = serde_json::to_value(&cost).unwrap();
        assert_eq!(
            value,
            json!({"promptTokens": 100, "completionTokens": 50, "totalTokens": 150, "costString": "$0.01"})
        );
    }

    #[test]
    fn total_saturates() {
        let cost = NodeTokenCost::new(u64::MAX, 10, "");
        assert_eq!(cost.total_tokens, u64::MAX);
    }

    #[test]
    fn missing_fields_default() {
        let cost: NodeTokenCost = serde_json::from_value(json!({"totalTokens": 42})).unwrap();
        assert_eq!(cost.total_tokens, 42);
        assert_eq!(cost.cost_string, "");
    }
}
