//! 命令行参数

use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::storage::StorageConfig;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// 远程路径前缀
pub const REMOTE_PREFIX: &str = "remote:";

#[derive(Parser, Debug)]
#[command(name = "davsync", version, about = "本地目录与 WebDAV 存储之间的单向同步")]
pub struct Cli {
    /// 源路径，`remote:/path` 表示 WebDAV 上的路径
    pub source: String,

    /// 目标路径，`remote:/path` 表示 WebDAV 上的路径
    pub dest: String,

    /// WebDAV 服务地址
    #[arg(long, env = "DAVSYNC_ENDPOINT")]
    pub endpoint: Option<String>,

    /// WebDAV 用户名
    #[arg(short, long, env = "DAVSYNC_USER")]
    pub user: Option<String>,

    /// WebDAV 密码
    #[arg(short, long, env = "DAVSYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// 并行 worker 数（覆盖配置文件）
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// 远程操作最大重试次数（覆盖配置文件）
    #[arg(long)]
    pub retries: Option<u32>,

    /// 额外的排除规则，可重复
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 把生效的同步配置（含命令行覆盖）写回配置文件
    #[arg(long)]
    pub save_config: bool,

    /// 只打印执行计划，不执行
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// 以 JSON 输出同步报告
    #[arg(long)]
    pub json: bool,

    /// 不显示进度条
    #[arg(long)]
    pub no_progress: bool,

    /// 控制台日志详细程度（-v info, -vv debug）
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// 一个同步端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(String),
    /// WebDAV 上的根目录（以 `/` 开头）
    Remote(String),
}

impl Location {
    pub fn parse(arg: &str) -> Self {
        match arg.strip_prefix(REMOTE_PREFIX) {
            Some(path) => {
                let path = path.trim();
                if path.starts_with('/') {
                    Location::Remote(path.to_string())
                } else {
                    Location::Remote(format!("/{}", path))
                }
            }
            None => Location::Local(arg.to_string()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }
}

impl Cli {
    /// 解析源和目标，要求恰好一侧是远程路径
    pub fn locations(&self) -> Result<(Location, Location), SyncError> {
        let source = Location::parse(&self.source);
        let dest = Location::parse(&self.dest);

        match (source.is_remote(), dest.is_remote()) {
            (true, true) => Err(SyncError::InvalidLocation(
                "源和目标不能同时是远程路径".to_string(),
            )),
            (false, false) => Err(SyncError::InvalidLocation(format!(
                "源或目标之一必须以 '{}' 开头",
                REMOTE_PREFIX
            ))),
            _ => Ok((source, dest)),
        }
    }

    /// 把源和目标转换为存储配置
    pub fn storage_configs(&self) -> Result<(StorageConfig, StorageConfig), SyncError> {
        let (source, dest) = self.locations()?;
        Ok((self.storage_config(source)?, self.storage_config(dest)?))
    }

    fn storage_config(&self, location: Location) -> Result<StorageConfig, SyncError> {
        match location {
            Location::Local(path) => Ok(StorageConfig::local(path)),
            Location::Remote(root) => {
                let endpoint = self
                    .endpoint
                    .clone()
                    .ok_or(SyncError::MissingConfig("endpoint"))?;
                Ok(StorageConfig::webdav(
                    endpoint,
                    self.user.clone(),
                    self.password.clone(),
                    root,
                ))
            }
        }
    }

    /// 命令行参数覆盖配置文件中的同步设置
    pub fn apply_overrides(&self, settings: &mut SyncSettings) {
        if let Some(workers) = self.workers {
            settings.workers = workers.max(1);
        }
        if let Some(retries) = self.retries {
            settings.max_retries = retries;
        }
        settings.exclude_patterns.extend(self.exclude.iter().cloned());
    }
}
