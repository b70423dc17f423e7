use crate::core::entry::normalize_path;
use crate::core::FsEntry;
use crate::storage::Storage;
use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

/// 文件扫描器配置
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// 排除规则（glob patterns）
    pub exclude_patterns: Vec<String>,
}

/// 文件扫描器：列出一个 scope，并把名称转换为相对于 scope 的路径
pub struct FileScanner {
    excludes: GlobSet,
}

/// 不含 `/` 的规则在任意层级匹配，`dir/**` 同时匹配 `dir` 本身
fn expand_pattern(pattern: &str) -> Vec<String> {
    let pattern = pattern.trim().trim_start_matches('/');
    let mut expanded = vec![pattern.to_string()];
    if !pattern.contains('/') {
        expanded.push(format!("**/{}", pattern));
    }
    if let Some(dir) = pattern.strip_suffix("/**") {
        if !dir.is_empty() {
            expanded.push(dir.to_string());
        }
    }
    expanded
}

fn build_excludes(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns.iter().filter(|p| !p.trim().is_empty()) {
        for expanded in expand_pattern(pattern) {
            match GlobBuilder::new(&expanded)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    warn!("忽略无效的排除规则 {}: {}", pattern, e);
                    break;
                }
            }
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("排除规则编译失败，不排除任何文件: {}", e);
        GlobSet::empty()
    })
}

impl FileScanner {
    pub fn with_config(config: ScanConfig) -> Self {
        Self {
            excludes: build_excludes(&config.exclude_patterns),
        }
    }

    /// 检查路径是否应该被排除。被排除目录下的所有条目也一并排除。
    pub fn should_exclude(&self, path: &str) -> bool {
        if self.excludes.is_empty() {
            return false;
        }
        std::iter::once(path)
            .chain(path.match_indices('/').map(|(i, _)| &path[..i]))
            .any(|p| self.excludes.is_match(p))
    }

    /// 递归扫描 scope，返回相对于 scope 的条目列表（无序）
    pub async fn scan_storage(&self, storage: &dyn Storage, scope: &str) -> Result<Vec<FsEntry>> {
        let scope = normalize_path(scope);
        info!("开始扫描存储: {}, scope: {:?}", storage.name(), scope);

        let listed = storage.list(&scope, true).await?;
        debug!("list 返回 {} 个条目", listed.len());

        let mut entries = Vec::with_capacity(listed.len());
        let mut excluded_count = 0;

        for entry in listed {
            let Some(entry) = entry.relative_to(&scope) else {
                continue;
            };

            if self.should_exclude(entry.name()) {
                debug!("排除: {}", entry.name());
                excluded_count += 1;
                continue;
            }

            entries.push(entry);
        }

        let dir_count = entries.iter().filter(|e| e.is_dir()).count();
        info!(
            "扫描完成: {} 个文件, {} 个目录, {} 个被排除",
            entries.len() - dir_count,
            dir_count,
            excluded_count
        );

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn scanner(patterns: &[&str]) -> FileScanner {
        FileScanner::with_config(ScanConfig {
            exclude_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        })
    }

    #[test]
    fn test_patterns() {
        let s = scanner(&[".git/**", "*.tmp", "Thumbs.db"]);
        assert!(s.should_exclude(".git"));
        assert!(s.should_exclude(".git/objects/ab"));
        assert!(s.should_exclude("a/b/file.TMP"));
        assert!(s.should_exclude("file.tmp"));
        assert!(s.should_exclude("photos/thumbs.db"));
        assert!(!s.should_exclude("a/tmp"));
        assert!(!s.should_exclude(".gitignore"));
        assert!(!s.should_exclude("notes.txt"));
    }

    #[test]
    fn test_double_star_prefix() {
        let s = scanner(&["**/*.tmp"]);
        assert!(s.should_exclude("a/b/x.tmp"));
        assert!(s.should_exclude("x.tmp"));
        assert!(!s.should_exclude("a/b/x.txt"));
    }

    #[test]
    fn test_excluded_dir_covers_descendants() {
        let s = scanner(&["cache", "docs/drafts"]);
        assert!(s.should_exclude("cache"));
        assert!(s.should_exclude("cache/blob"));
        assert!(s.should_exclude("a/cache/deep/blob"));
        assert!(s.should_exclude("docs/drafts/one.md"));
        assert!(!s.should_exclude("docs/final.md"));
        assert!(!s.should_exclude("cached"));
    }

    #[test]
    fn test_separator_is_literal() {
        let s = scanner(&["docs/*.md"]);
        assert!(s.should_exclude("docs/a.md"));
        assert!(!s.should_exclude("docs/sub/a.md"));
        assert!(!s.should_exclude("other/docs/a.md"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let s = scanner(&["[unclosed", "*.log"]);
        assert!(s.should_exclude("run.log"));
        assert!(!s.should_exclude("[unclosed"));
    }

    #[tokio::test]
    async fn test_scan_drops_children_of_excluded_dir() {
        let store = MemoryStorage::new();
        store.add_dir("cache");
        store.add_file("cache/blob", b"1");
        store.add_file("keep", b"2");

        let entries = scanner(&["cache"]).scan_storage(&store, "").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["keep"]);
    }

    #[tokio::test]
    async fn test_scan_relativizes_to_scope() {
        let store = MemoryStorage::new();
        store.add_dir("backup");
        store.add_dir("backup/docs");
        store.add_file("backup/docs/a.txt", b"abc");
        store.add_file("backup/skip.tmp", b"x");
        store.add_file("elsewhere.txt", b"zz");

        let entries = scanner(&["*.tmp"])
            .scan_storage(&store, "/backup/")
            .await
            .unwrap();

        let mut names: Vec<_> = entries.iter().map(|e| e.name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["docs", "docs/a.txt"]);
    }
}
