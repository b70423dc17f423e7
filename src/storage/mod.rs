pub mod local;
pub mod retry;
pub mod webdav;

#[cfg(test)]
pub(crate) mod memory;

use crate::config::SyncSettings;
use crate::core::FsEntry;
use crate::error::SyncError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use local::LocalStorage;
pub use retry::RetryPolicy;
pub use webdav::WebDavStorage;

/// 存储抽象接口，源端和目标端都通过它访问
#[async_trait]
pub trait Storage: Send + Sync {
    /// 列出 scope 下的条目（不要求有序），名称相对于存储根目录
    async fn list(&self, scope: &str, recursive: bool) -> Result<Vec<FsEntry>>;

    /// 创建目录，已存在时不报错
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// 删除空目录
    async fn rmdir(&self, path: &str) -> Result<()>;

    /// 删除单个文件
    async fn rm(&self, path: &str) -> Result<()>;

    /// 写入文件，返回写入的字节数
    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<u64>;

    /// 读取整个文件
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 存储类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    WebDav,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub typ: StorageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl StorageConfig {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            typ: StorageType::Local,
            path: Some(path.into()),
            endpoint: None,
            username: None,
            password: None,
            root: None,
        }
    }

    pub fn webdav(
        endpoint: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            typ: StorageType::WebDav,
            path: None,
            endpoint: Some(endpoint.into()),
            username,
            password,
            root: Some(root.into()),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.typ == StorageType::WebDav
    }
}

/// 根据配置创建存储实例
pub async fn create_storage(
    config: &StorageConfig,
    settings: &SyncSettings,
) -> Result<Arc<dyn Storage>> {
    match config.typ {
        StorageType::Local => {
            let path = config
                .path
                .as_ref()
                .ok_or(SyncError::MissingConfig("path"))?;
            tracing::info!("初始化本地存储: {}", path);
            Ok(Arc::new(LocalStorage::new(path)?) as Arc<dyn Storage>)
        }
        StorageType::WebDav => {
            let endpoint = config
                .endpoint
                .as_ref()
                .ok_or(SyncError::MissingConfig("endpoint"))?;
            tracing::info!("创建WebDAV存储: endpoint={}, root={:?}", endpoint, config.root);
            let storage = WebDavStorage::new(
                endpoint,
                config.username.as_deref(),
                config.password.as_deref(),
                config.root.clone(),
                settings,
            )
            .await?;
            Ok(Arc::new(storage) as Arc<dyn Storage>)
        }
    }
}
