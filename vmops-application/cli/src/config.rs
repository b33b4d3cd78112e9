//! CLI 配置管理
//!
//! **数据存储方式**: TOML 文件 (~/.config/vmops/config.toml)
//!
//! 优先级: 命令行参数 > 环境变量 (`VMOPS_MAX_WORKERS` / `VMOPS_UNIT_TIMEOUT`) > 配置文件 > 默认值

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vmops_driver::EndpointConfig;
use vmops_executor::DEFAULT_MAX_WORKERS;

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "VMOPS_CONFIG";
pub const MAX_WORKERS_ENV: &str = "VMOPS_MAX_WORKERS";
pub const UNIT_TIMEOUT_ENV: &str = "VMOPS_UNIT_TIMEOUT";

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// 执行器配置
    #[serde(default)]
    pub executor: ExecutorSection,

    /// 管理端点配置
    #[serde(default)]
    pub endpoint: EndpointSection,
}

/// 执行器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSection {
    /// 最大并发数
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// 单个虚拟机操作超时（秒），0 表示不限制
    #[serde(default)]
    pub unit_timeout_secs: u64,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            unit_timeout_secs: 0,
        }
    }
}

/// 管理端点配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSection {
    /// 连接超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl CliConfig {
    /// 获取默认配置文件路径
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("无法获取用户主目录")?;
        Ok(home.join(".config").join("vmops").join("config.toml"))
    }

    /// 加载配置 (显式路径 > VMOPS_CONFIG > 默认路径) 并应用环境变量
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match env::var(CONFIG_ENV) {
                Ok(path) => PathBuf::from(path),
                Err(_) => Self::config_path()?,
            },
        };

        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// 从文件加载配置，文件不存在时返回默认值
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))
    }

    /// 应用环境变量覆盖
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MAX_WORKERS_ENV) {
            self.executor.max_workers = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {}", MAX_WORKERS_ENV, value))?;
        }
        if let Some(value) = lookup(UNIT_TIMEOUT_ENV) {
            self.executor.unit_timeout_secs = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {}", UNIT_TIMEOUT_ENV, value))?;
        }
        Ok(())
    }

    /// 单元超时，0 表示不限制
    pub fn unit_timeout(&self) -> Option<Duration> {
        Some(self.executor.unit_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// 端点客户端配置 (证书校验由连接参数决定)
    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            connect_timeout: self.endpoint.connect_timeout,
            request_timeout: self.endpoint.request_timeout,
            ..EndpointConfig::default()
        }
    }
}
