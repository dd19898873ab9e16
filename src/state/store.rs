use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Result, TelemetryError};

/// 键值存储 trait
///
/// 对应浏览器 localStorage 一类的外部持久化能力。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// 内存存储实现
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.inner.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.write().remove(key);
        Ok(())
    }
}

/// 文件存储实现：每个键一个 `<key>.json` 文件
///
/// 字母、数字、`-`、`_`、`.` 原样保留，其余字节编码为 `%XX`，不同的键不会落到同一个文件。
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(TelemetryError::Storage(error.to_string())),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(feature = "redis-store")]
pub mod redis {
    use super::*;
    use redis::aio::MultiplexedConnection;
    use redis::AsyncCommands;

    fn storage_error(error: redis::RedisError) -> TelemetryError {
        TelemetryError::Storage(format!("redis: {error}"))
    }

    /// Redis 存储实现，可选键前缀用于多个部署共用一个实例
    pub struct RedisStore {
        client: redis::Client,
        namespace: Option<String>,
    }

    impl RedisStore {
        pub fn new(client: redis::Client) -> Self {
            Self {
                client,
                namespace: None,
            }
        }

        pub fn from_url(url: &str) -> Result<Self> {
            redis::Client::open(url).map(Self::new).map_err(storage_error)
        }

        pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
            self.namespace = Some(namespace.into());
            self
        }

        fn full_key(&self, key: &str) -> String {
            match &self.namespace {
                Some(namespace) => format!("{namespace}:{key}"),
                None => key.to_string(),
            }
        }

        async fn connection(&self) -> Result<MultiplexedConnection> {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(storage_error)
        }
    }

    #[async_trait]
    impl KeyValueStore for RedisStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.connection().await?;
            conn.get(self.full_key(key)).await.map_err(storage_error)
        }

        async fn set(&self, key: &str, value: String) -> Result<()> {
            let mut conn = self.connection().await?;
            let _: () = conn
                .set(self.full_key(key), value)
                .await
                .map_err(storage_error)?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            let mut conn = self.connection().await?;
            let removed: usize = conn.del(self.full_key(key)).await.map_err(storage_error)?;
            tracing::debug!(key, removed, "redis key deleted");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() -> Result<()> {
        let store = MemoryStore::new();
        store.set("a", "1".into()).await?;
        assert_eq!(store.get("a").await?, Some("1".to_string()));
        store.delete("a").await?;
        assert!(store.get("a").await?.is_none());
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn key_encoding_is_injective() {
        assert_eq!(encode_key("workflow-7-token-costs"), "workflow-7-token-costs");
        assert_eq!(encode_key("workflow/7"), "workflow%2F7");
        assert_eq!(encode_key("workflow%2F7"), "workflow%252F7");
        assert_ne!(encode_key("workflow/7"), encode_key("workflow_7"));
    }

    #[tokio::test]
    async fn file_store_keeps_similar_keys_apart() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path().join("state"));
        assert!(store.get("workflow-7-token-costs").await?.is_none());

        store.set("workflow/7", "{}".into()).await?;
        store.set("workflow_7", "[]".into()).await?;
        assert!(dir.path().join("state").join("workflow%2F7.json").exists());
        assert_eq!(store.get("workflow_7").await?, Some("[]".to_string()));
        assert_eq!(store.get("workflow/7").await?, Some("{}".to_string()));

        store.delete("workflow/7").await?;
        store.delete("workflow/7").await?;
        assert!(store.get("workflow/7").await?.is_none());
        Ok(())
    }
}
