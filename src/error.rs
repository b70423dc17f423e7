//! 错误类型

use thiserror::Error;

/// 条目类型，用于冲突提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "目录"),
            EntryKind::File => write!(f, "文件"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// 同名条目在两侧类型不同（文件 <-> 目录），不支持
    #[error("类型冲突: '{path}' 在源端是{origin}，在目标端是{target}")]
    TypeConflict {
        path: String,
        origin: EntryKind,
        target: EntryKind,
    },

    /// 源/目标参数不合法
    #[error("无效的路径参数: {0}")]
    InvalidLocation(String),

    /// 存储配置缺少必要字段
    #[error("存储配置缺少字段: {0}")]
    MissingConfig(&'static str),
}
