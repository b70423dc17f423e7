//! 应用配置模块
//!
//! 配置保存在 `config.json` 中，按 section 读取：`sync` 和 `log`。
//! 缺失的字段使用默认值，文件损坏时整体回退到默认配置并记录问题。

use crate::logging::LogConfig;
use crate::storage::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// 并行阶段的 worker 数
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// 远程操作最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试基础延迟（毫秒）
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// 非 IO 操作超时（秒）- stat, delete 等
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    /// IO 操作超时（秒）- read, write 等
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// 排除规则（glob patterns），两侧同时生效
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_op_timeout_secs() -> u64 {
    60
}

fn default_io_timeout_secs() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            op_timeout_secs: default_op_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl SyncSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay_ms)
    }
}

/// 完整配置
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub sync: SyncSettings,
    pub log: LogConfig,
    /// 加载时发现的问题。日志系统在读取配置之后才初始化，由调用方在初始化后输出。
    pub problems: Vec<String>,
}

impl AppConfig {
    /// 从指定文件加载，文件不存在时使用默认配置
    pub fn load_file(config_file: &Path) -> Self {
        let mut problems = Vec::new();
        let root = read_json(config_file, &mut problems);
        Self {
            sync: section(&root, "sync", &mut problems),
            log: section(&root, "log", &mut problems),
            problems,
        }
    }

    /// 保存到指定文件，保留文件中的其他 section
    pub fn save_file(&self, config_file: &Path) -> io::Result<()> {
        if let Some(parent) = config_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut config = read_json(config_file, &mut Vec::new());
        if !config.is_object() {
            config = serde_json::json!({});
        }
        config["sync"] = serde_json::to_value(&self.sync)?;
        config["log"] = serde_json::to_value(&self.log)?;

        fs::write(config_file, serde_json::to_string_pretty(&config)?)
    }
}

fn read_json(config_file: &Path, problems: &mut Vec<String>) -> serde_json::Value {
    let content = match fs::read_to_string(config_file) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return serde_json::json!({}),
        Err(e) => {
            problems.push(format!("无法读取配置文件 {}: {}", config_file.display(), e));
            return serde_json::json!({});
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        problems.push(format!(
            "配置文件 {} 格式错误，使用默认配置: {}",
            config_file.display(),
            e
        ));
        serde_json::json!({})
    })
}

fn section<T>(root: &serde_json::Value, key: &str, problems: &mut Vec<String>) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    root.get(key)
        .and_then(|value| match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                problems.push(format!("配置项 {} 无效，使用默认值: {}", key, e));
                None
            }
        })
        .unwrap_or_default()
}

/// 默认配置文件路径
pub fn default_config_file() -> PathBuf {
    default_config_dir().join(CONFIG_FILE)
}

/// 默认配置目录
pub fn default_config_dir() -> PathBuf {
    crate::dirs::config_dir()
        .map(|p| p.join("davsync"))
        .unwrap_or_else(|| PathBuf::from(".davsync"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_file(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join(CONFIG_FILE)
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_file(&config_file(&dir));
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.sync.workers, 4);
        assert_eq!(config.log.level, "info");
        assert!(config.problems.is_empty());
    }

    #[test]
    fn test_partial_section() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            config_file(&dir),
            r#"{"sync": {"workers": 8, "excludePatterns": ["*.tmp"]}, "other": 1}"#,
        )
        .unwrap();

        let config = AppConfig::load_file(&config_file(&dir));
        assert_eq!(config.sync.workers, 8);
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.sync.exclude_patterns, vec!["*.tmp".to_string()]);
        assert!(config.problems.is_empty());
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(config_file(&dir), "{ not json").unwrap();
        let config = AppConfig::load_file(&config_file(&dir));
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.problems.len(), 1);
        assert!(config.problems[0].contains("格式错误"));
    }

    #[test]
    fn test_invalid_section_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            config_file(&dir),
            r#"{"sync": {"workers": "many"}, "log": {"level": "debug"}}"#,
        )
        .unwrap();

        let config = AppConfig::load_file(&config_file(&dir));
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.problems.len(), 1);
        assert!(config.problems[0].contains("sync"));
    }

    #[test]
    fn test_save_keeps_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"other": {"x": 1}}"#).unwrap();

        let mut config = AppConfig::default();
        config.sync.workers = 2;
        config.save_file(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["other"]["x"], 1);
        assert_eq!(AppConfig::load_file(&path).sync.workers, 2);
    }
}
