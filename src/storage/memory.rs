//! 测试用的内存存储

use super::Storage;
use crate::core::entry::normalize_path;
use crate::core::FsEntry;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
pub struct MemoryStorage {
    nodes: Mutex<BTreeMap<String, Node>>,
    /// 对这些路径的写/删操作，以及以它为 scope 的 list 都会失败
    failing: Mutex<HashSet<String>>,
    /// 对这些路径的写/删操作会 panic
    panicking: Mutex<HashSet<String>>,
    /// 每次 upload/download 的人为延迟
    delay: Option<Duration>,
    /// 操作日志，按调用顺序记录
    journal: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn add_dir(&self, path: &str) {
        self.nodes.lock().insert(normalize_path(path), Node::Dir);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.nodes
            .lock()
            .insert(normalize_path(path), Node::File(data.to_vec()));
    }

    pub fn fail_on(&self, path: &str) {
        self.failing.lock().insert(normalize_path(path));
    }

    pub fn panic_on(&self, path: &str) {
        self.panicking.lock().insert(normalize_path(path));
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.lock().get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn has_dir(&self, path: &str) -> bool {
        matches!(self.nodes.lock().get(path), Some(Node::Dir))
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    fn check(&self, action: &str, path: &str) -> Result<String> {
        let path = normalize_path(path);
        self.journal.lock().push(format!("{} {}", action, path));
        let panics = self.panicking.lock().contains(&path);
        if panics {
            panic!("injected panic: {} {}", action, path);
        }
        if self.failing.lock().contains(&path) {
            return Err(anyhow!("injected failure: {} {}", action, path));
        }
        Ok(path)
    }

    fn parent_exists(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some((parent, _)) => matches!(nodes.get(parent), Some(Node::Dir)),
            None => true,
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list(&self, scope: &str, recursive: bool) -> Result<Vec<FsEntry>> {
        let scope = normalize_path(scope);
        if self.failing.lock().contains(&scope) {
            return Err(anyhow!("injected failure: list {:?}", scope));
        }
        let nodes = self.nodes.lock();
        let entries = nodes
            .iter()
            .filter_map(|(name, node)| {
                let rest = if scope.is_empty() {
                    name.as_str()
                } else {
                    name.strip_prefix(scope.as_str())?.strip_prefix('/')?
                };
                if !recursive && rest.contains('/') {
                    return None;
                }
                Some(match node {
                    Node::Dir => FsEntry::dir(name, 0),
                    Node::File(data) => FsEntry::file(name, 0, data.len() as u64),
                })
            })
            .collect();
        Ok(entries)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let path = self.check("mkdir", path)?;
        let mut nodes = self.nodes.lock();
        if !Self::parent_exists(&nodes, &path) {
            return Err(anyhow!("parent missing: {}", path));
        }
        nodes.insert(path, Node::Dir);
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let path = self.check("rmdir", path)?;
        let mut nodes = self.nodes.lock();
        let prefix = format!("{}/", path);
        if nodes.keys().any(|k| k.starts_with(&prefix)) {
            return Err(anyhow!("directory not empty: {}", path));
        }
        nodes.remove(&path);
        Ok(())
    }

    async fn rm(&self, path: &str) -> Result<()> {
        let path = self.check("rm", path)?;
        self.nodes.lock().remove(&path);
        Ok(())
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<u64> {
        let path = self.check("upload", path)?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut nodes = self.nodes.lock();
        if !Self::parent_exists(&nodes, &path) {
            return Err(anyhow!("parent missing: {}", path));
        }
        let len = data.len() as u64;
        nodes.insert(path, Node::File(data));
        Ok(len)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize_path(path);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.file(&path).ok_or_else(|| anyhow!("not found: {}", path))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
