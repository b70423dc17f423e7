pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod render;
pub mod storage;

pub use config::{AppConfig, SyncSettings};
pub use core::{build_plan, ExecutionPlan, FsEntry, SyncEngine, SyncReport};
pub use error::SyncError;
pub use storage::{create_storage, Storage, StorageConfig, StorageType};

/// 平台配置目录，不引入额外依赖
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}
