use std::sync::Arc;

use tracing::{debug, warn};

use super::cost::TokenCostMap;
use crate::error::Result;
use crate::state::KeyValueStore;

const KEY_SUFFIX: &str = "token-costs";

/// 按工作流持久化节点成本表
///
/// 每个工作流一个 JSON 对象，键为 `{prefix}-{workflow_id}-token-costs`，后写覆盖先写。
#[derive(Clone)]
pub struct TokenCostPersistence {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl TokenCostPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    pub fn key(&self, workflow_id: &str) -> String {
        format!("{}-{}-{}", self.prefix, workflow_id, KEY_SUFFIX)
    }

    /// 读取持久化的成本表；缺失、读取失败或解析失败时返回空表
    pub async fn load(&self, workflow_id: &str) -> TokenCostMap {
        let key = self.key(workflow_id);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%key, "no persisted token costs");
                return TokenCostMap::new();
            }
            Err(error) => {
                warn!(%key, %error, "failed to read persisted token costs");
                return TokenCostMap::new();
            }
        };

        match serde_json::from_str::<TokenCostMap>(&raw) {
            Ok(costs) => {
                debug!(%key, nodes = costs.len(), "rehydrated token costs");
                costs
            }
            Err(error) => {
                warn!(%key, %error, "discarding unparseable token costs");
                TokenCostMap::new()
            }
        }
    }

    pub async fn save(&self, workflow_id: &str, costs: &TokenCostMap) -> Result<()> {
        let value = serde_json::to_string(costs)?;
        self.store.set(&self.key(workflow_id), value).await
    }

    pub async fn clear(&self, workflow_id: &str) -> Result<()> {
        self.store.delete(&self.key(workflow_id)).await
    }
}
