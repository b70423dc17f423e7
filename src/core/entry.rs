//! 文件条目模型

use crate::error::EntryKind;
use std::cmp::Ordering;

/// 列表中的一个条目，名称为相对于扫描根目录的规范化路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEntry {
    Directory {
        name: String,
        modified_at: i64,
    },
    File {
        name: String,
        modified_at: i64,
        byte_length: u64,
    },
}

impl FsEntry {
    pub fn dir(name: impl AsRef<str>, modified_at: i64) -> Self {
        FsEntry::Directory {
            name: normalize_path(name.as_ref()),
            modified_at,
        }
    }

    pub fn file(name: impl AsRef<str>, modified_at: i64, byte_length: u64) -> Self {
        FsEntry::File {
            name: normalize_path(name.as_ref()),
            modified_at,
            byte_length,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FsEntry::Directory { name, .. } | FsEntry::File { name, .. } => name,
        }
    }

    pub fn modified_at(&self) -> i64 {
        match self {
            FsEntry::Directory { modified_at, .. } | FsEntry::File { modified_at, .. } => {
                *modified_at
            }
        }
    }

    /// 文件大小，目录为 None
    pub fn byte_length(&self) -> Option<u64> {
        match self {
            FsEntry::Directory { .. } => None,
            FsEntry::File { byte_length, .. } => Some(*byte_length),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FsEntry::Directory { .. })
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            FsEntry::Directory { .. } => EntryKind::Directory,
            FsEntry::File { .. } => EntryKind::File,
        }
    }

    /// 路径深度（路径分隔符个数）
    pub fn depth(&self) -> usize {
        path_depth(self.name())
    }

    /// 去掉 `prefix` 前缀后的新条目；不在 prefix 下时返回 None
    pub fn relative_to(&self, prefix: &str) -> Option<FsEntry> {
        let prefix = normalize_path(prefix);
        let name = if prefix.is_empty() {
            self.name()
        } else {
            self.name()
                .strip_prefix(prefix.as_str())?
                .strip_prefix('/')?
        };
        if name.is_empty() {
            return None;
        }
        Some(match self {
            FsEntry::Directory { modified_at, .. } => FsEntry::dir(name, *modified_at),
            FsEntry::File {
                modified_at,
                byte_length,
                ..
            } => FsEntry::file(name, *modified_at, *byte_length),
        })
    }
}

/// 规范化路径：统一使用 `/`，去掉首尾分隔符和 `./` 片段
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

pub fn path_depth(path: &str) -> usize {
    path.matches('/').count()
}

/// 按路径段做字典序比较（`a/b` 排在 `a-b` 之前）
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

/// 按名称升序排序
pub fn sort_entries(entries: &mut [FsEntry]) {
    entries.sort_by(|a, b| compare_names(a.name(), b.name()));
}

pub(crate) fn is_sorted(entries: &[&FsEntry]) -> bool {
    entries
        .windows(2)
        .all(|w| compare_names(w[0].name(), w[1].name()) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a\\b/c/"), "a/b/c");
        assert_eq!(normalize_path("./a//b"), "a/b");
        assert_eq!(normalize_path("/"), "");
    }

    #[test]
    fn test_depth() {
        assert_eq!(FsEntry::dir("a", 0).depth(), 0);
        assert_eq!(FsEntry::dir("a/b/c", 0).depth(), 2);
    }

    #[test]
    fn test_segment_order() {
        let mut entries = vec![
            FsEntry::file("a-b", 0, 1),
            FsEntry::file("a/b", 0, 1),
            FsEntry::dir("a", 0),
        ];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "a/b", "a-b"]);
    }

    #[test]
    fn test_relative_to() {
        let entry = FsEntry::file("backup/docs/a.txt", 7, 3);
        assert_eq!(
            entry.relative_to("/backup/"),
            Some(FsEntry::file("docs/a.txt", 7, 3))
        );
        assert_eq!(entry.relative_to("other"), None);
        assert_eq!(FsEntry::dir("backup", 0).relative_to("backup"), None);
        assert_eq!(entry.relative_to(""), Some(entry.clone()));
    }
}
