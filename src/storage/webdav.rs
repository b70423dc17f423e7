use super::{RetryPolicy, Storage};
use crate::config::SyncSettings;
use crate::core::entry::normalize_path;
use crate::core::FsEntry;
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Buffer, Metakey, Operator};
use std::time::Duration;

pub struct WebDavStorage {
    operator: Operator,
    retry: RetryPolicy,
    name: String,
}

fn is_transient(e: &opendal::Error) -> bool {
    e.is_temporary()
}

fn is_not_found(e: &opendal::Error) -> bool {
    e.kind() == opendal::ErrorKind::NotFound
}

/// opendal 用结尾的 `/` 区分目录
fn dir_path(path: &str) -> String {
    let path = normalize_path(path);
    if path.is_empty() {
        "/".to_string()
    } else {
        format!("{}/", path)
    }
}

impl WebDavStorage {
    pub async fn new(
        endpoint: &str,
        username: Option<&str>,
        password: Option<&str>,
        root: Option<String>,
        settings: &SyncSettings,
    ) -> Result<Self> {
        use opendal::services::Webdav;

        let mut builder = Webdav::default().endpoint(endpoint);
        if let Some(user) = username {
            builder = builder.username(user);
        }
        if let Some(pass) = password {
            builder = builder.password(pass);
        }
        if let Some(ref r) = root {
            builder = builder.root(r);
        }

        // 添加超时层
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(settings.op_timeout_secs))
                    .with_io_timeout(Duration::from_secs(settings.io_timeout_secs)),
            )
            .finish();

        let name = format!(
            "webdav://{}{}",
            endpoint.trim_end_matches('/'),
            root.as_deref()
                .map(|r| format!("/{}", r.trim_start_matches('/')))
                .unwrap_or_default()
        );

        // 尝试创建根目录（某些 WebDAV 服务器需要）
        // 忽略错误，目录可能已存在或不需要创建
        let _ = operator.create_dir("/").await;

        Ok(Self {
            operator,
            retry: settings.retry_policy(),
            name,
        })
    }
}

#[async_trait]
impl Storage for WebDavStorage {
    async fn list(&self, scope: &str, recursive: bool) -> Result<Vec<FsEntry>> {
        let dir = dir_path(scope);
        let op = &self.operator;
        let dir_ref = dir.as_str();

        let listed = self
            .retry
            .run(&format!("列出 {}", dir), is_transient, move || async move {
                let mut lister = op
                    .lister_with(dir_ref)
                    .recursive(recursive)
                    .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
                    .await?;
                let mut entries = Vec::new();
                while let Some(entry) = lister.try_next().await? {
                    entries.push(entry);
                }
                Ok::<_, opendal::Error>(entries)
            })
            .await;

        let listed = match listed {
            Ok(entries) => entries,
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let scope_name = normalize_path(scope);
        let mut entries = Vec::with_capacity(listed.len());
        for entry in listed {
            let path = normalize_path(entry.path());

            // 跳过根目录本身
            if path.is_empty() || path == scope_name {
                continue;
            }

            let meta = entry.metadata();
            let modified = meta.last_modified().map_or(0, |t| t.timestamp());
            if meta.is_dir() {
                entries.push(FsEntry::dir(&path, modified));
            } else {
                entries.push(FsEntry::file(&path, modified, meta.content_length()));
            }
        }

        Ok(entries)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let dir = dir_path(path);
        let op = &self.operator;
        let dir_ref = dir.as_str();
        self.retry
            .run(&format!("创建目录 {}", dir), is_transient, move || {
                op.create_dir(dir_ref)
            })
            .await?;
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let dir = dir_path(path);
        let op = &self.operator;
        let dir_ref = dir.as_str();
        match self
            .retry
            .run(&format!("删除目录 {}", dir), is_transient, move || op.delete(dir_ref))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn rm(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        let op = &self.operator;
        let path_ref = path.as_str();
        match self
            .retry
            .run(&format!("删除文件 {}", path), is_transient, move || op.delete(path_ref))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<u64> {
        let path = normalize_path(path);
        let len = data.len() as u64;
        // Buffer 克隆只增加引用计数，重试时不复制数据
        let buffer = Buffer::from(data);
        let op = &self.operator;
        let path_ref = path.as_str();

        self.retry
            .run(&format!("上传 {}", path), is_transient, move || {
                let buffer = buffer.clone();
                async move {
                    op.write(path_ref, buffer).await?;
                    Ok::<_, opendal::Error>(())
                }
            })
            .await?;
        Ok(len)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize_path(path);
        let op = &self.operator;
        let path_ref = path.as_str();
        let data = self
            .retry
            .run(&format!("下载 {}", path), is_transient, move || op.read(path_ref))
            .await?;
        Ok(data.to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_path() {
        assert_eq!(dir_path(""), "/");
        assert_eq!(dir_path("/a/b/"), "a/b/");
        assert_eq!(dir_path("a\\b"), "a/b/");
    }

    #[test]
    fn test_transient_classification() {
        let temporary =
            opendal::Error::new(opendal::ErrorKind::Unexpected, "reset").set_temporary();
        let missing = opendal::Error::new(opendal::ErrorKind::NotFound, "gone");
        assert!(is_transient(&temporary));
        assert!(!is_transient(&missing));
        assert!(is_not_found(&missing));
    }
}
