use super::Storage;
use crate::core::entry::normalize_path;
use crate::core::FsEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub struct LocalStorage {
    base_path: PathBuf,
    name: String,
}

impl LocalStorage {
    pub fn new(path: &str) -> Result<Self> {
        let base_path = PathBuf::from(path);
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }
        let name = format!("local:{}", path);
        Ok(Self { base_path, name })
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = normalize_path(path);
        if path.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(path)
        }
    }

    /// 写入时使用的临时文件：同目录下的 `.<name>.partial`
    fn partial_path(full_path: &Path) -> PathBuf {
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        full_path.with_file_name(format!(".{}.partial", file_name))
    }

    fn modified_secs(metadata: &std::fs::Metadata) -> i64 {
        metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn list(&self, scope: &str, recursive: bool) -> Result<Vec<FsEntry>> {
        let base = self.resolve_path(scope);

        if !base.exists() {
            return Ok(Vec::new());
        }

        let base_path = self.base_path.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        // 任何遍历错误都让 list 失败，不返回不完整的列表
        let entries = tokio::task::spawn_blocking(move || -> Result<Vec<FsEntry>> {
            let mut walker = WalkDir::new(&base).follow_links(false).min_depth(1);
            if !recursive {
                walker = walker.max_depth(1);
            }

            let mut entries = Vec::new();
            for entry in walker {
                let entry = entry.with_context(|| format!("遍历目录失败: {}", base.display()))?;
                let metadata = entry
                    .metadata()
                    .with_context(|| format!("读取元数据失败: {}", entry.path().display()))?;
                let relative = entry
                    .path()
                    .strip_prefix(&base_path)?
                    .to_str()
                    .with_context(|| format!("路径不是有效的 UTF-8: {}", entry.path().display()))?;
                let modified = Self::modified_secs(&metadata);

                if metadata.is_dir() {
                    entries.push(FsEntry::dir(relative, modified));
                } else if metadata.is_file() {
                    entries.push(FsEntry::file(relative, modified, metadata.len()));
                }
                // 符号链接等特殊文件不参与同步
            }
            Ok(entries)
        })
        .await??;

        Ok(entries)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path)
            .await
            .with_context(|| format!("创建目录失败: {}", full_path.display()))?;
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        match fs::remove_dir(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("删除目录失败: {}", full_path.display()))
            }
        }
    }

    async fn rm(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("删除文件失败: {}", full_path.display()))
            }
        }
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<u64> {
        let full_path = self.resolve_path(path);
        let len = data.len() as u64;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 使用临时文件写入，然后原子重命名
        let temp_path = Self::partial_path(&full_path);
        fs::write(&temp_path, data)
            .await
            .with_context(|| format!("写入失败: {}", temp_path.display()))?;
        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("重命名失败: {}", full_path.display()));
        }

        Ok(len)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);
        let data = fs::read(&full_path)
            .await
            .with_context(|| format!("读取失败: {}", full_path.display()))?;
        Ok(data)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
