//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 覆盖连接字符串的环境变量
pub const REDIS_URL_ENV: &str = "CTXCACHE_REDIS_URL";

const MAX_TTL_SECS: u64 = 86400 * 30;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub config_version: Option<u32>,
    /// 后端存储配置
    pub store: StoreConfig,
    /// TTL策略
    pub ttl: TtlConfig,
    /// 执行器配置
    pub executor: ExecutorConfig,
    /// 健康探针配置
    pub health: HealthConfig,
    /// 预热配置
    pub warmup: WarmupConfig,
}

/// 存储模式枚举
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// 单机Redis
    #[default]
    Standalone,
    /// Redis哨兵模式
    Sentinel,
    /// 进程内存储，用于本地开发和测试
    Memory,
}

/// 后端存储配置
///
/// 定义分布式缓存（Redis）的连接与命令参数
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StoreConfig {
    /// 存储模式
    pub mode: StoreMode,
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// 瞬时故障的自动重试次数
    pub max_retries: u32,
    /// 重试退避的基础延迟（毫秒）
    pub retry_base_delay_ms: u64,
    /// SCAN 每次迭代的 COUNT 提示
    pub scan_count: usize,
    /// Redis 密码（可选，使用 SecretString 保护）
    pub password: Option<SecretString>,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 哨兵配置
    pub sentinel: Option<SentinelConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: StoreMode::Standalone,
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 2000,
            max_retries: 0,
            retry_base_delay_ms: 50,
            scan_count: 1000,
            password: None,
            enable_tls: false,
            sentinel: None,
        }
    }
}

impl StoreConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// 哨兵配置
#[derive(Deserialize, Clone, Debug)]
pub struct SentinelConfig {
    /// 主节点名称
    pub master_name: String,
    /// 哨兵节点列表
    pub nodes: Vec<String>,
}

/// TTL策略配置
///
/// `prefixes` 按键的类型前缀覆盖内置TTL
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct TtlConfig {
    /// 未匹配任何前缀时的默认TTL（秒）
    pub default_secs: u64,
    /// 前缀 -> TTL（秒）
    pub prefixes: HashMap<String, u64>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default_secs: 3600,
            prefixes: HashMap::new(),
        }
    }
}

/// 执行器配置
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 是否对同一键的并发未命中进行合并
    pub single_flight: bool,
}

/// 健康探针配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct HealthConfig {
    /// 探针键前缀
    pub key_prefix: String,
    /// 探针键的TTL（秒）
    pub sentinel_ttl_secs: u64,
    /// 内存使用率达到该比例时判定为降级
    pub memory_degraded_ratio: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            key_prefix: "health_check".to_string(),
            sentinel_ttl_secs: 10,
            memory_degraded_ratio: 0.9,
        }
    }
}

/// 预热配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct WarmupConfig {
    /// 是否启用预热
    pub enabled: bool,
    /// 单次预热的总超时（秒）
    pub timeout_seconds: u64,
    /// 并发加载数
    pub concurrency: usize,
    /// 定时预热的执行时刻（UTC，HH:MM）
    pub scheduled_at: String,
    /// 预测式预热保留的候选键数量
    pub predictive_top_n: usize,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: 60,
            concurrency: 8,
            scheduled_at: "03:00".to_string(),
            predictive_top_n: 100,
        }
    }
}

impl WarmupConfig {
    /// 解析 `scheduled_at` 为 (小时, 分钟)
    pub fn scheduled_time(&self) -> Result<chrono::NaiveTime> {
        chrono::NaiveTime::parse_from_str(self.scheduled_at.trim(), "%H:%M").map_err(|e| {
            CacheError::ConfigError(format!(
                "warmup.scheduled_at '{}' is not a valid HH:MM time: {}",
                self.scheduled_at, e
            ))
        })
    }
}

impl Config {
    /// 从TOML文件加载配置
    ///
    /// 加载后应用环境变量覆盖并验证
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| CacheError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.apply_env_overrides();
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }

    /// 使用环境变量覆盖连接字符串
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(REDIS_URL_ENV) {
            if !url.trim().is_empty() {
                self.store.connection_string = SecretString::new(url.into());
            }
        }
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        let store = &self.store;
        if store.mode != StoreMode::Memory
            && store.connection_string.expose_secret().trim().is_empty()
        {
            return Err("store.connection_string cannot be empty".to_string());
        }
        if !(100..=30000).contains(&store.connection_timeout_ms) {
            return Err("store.connection_timeout_ms must be between 100 and 30000 ms".to_string());
        }
        if !(100..=60000).contains(&store.command_timeout_ms) {
            return Err("store.command_timeout_ms must be between 100 and 60000 ms".to_string());
        }
        if store.max_retries > 10 {
            return Err("store.max_retries cannot exceed 10".to_string());
        }
        if store.scan_count == 0 {
            return Err("store.scan_count cannot be zero".to_string());
        }
        if store.mode == StoreMode::Sentinel {
            match &store.sentinel {
                Some(s) if !s.nodes.is_empty() && !s.master_name.is_empty() => {}
                _ => {
                    return Err(
                        "store.sentinel with master_name and nodes is required in sentinel mode"
                            .to_string(),
                    )
                }
            }
        }

        if self.ttl.default_secs == 0 || self.ttl.default_secs > MAX_TTL_SECS {
            return Err("ttl.default_secs must be between 1 and 2592000 seconds".to_string());
        }
        for (prefix, secs) in &self.ttl.prefixes {
            if prefix.trim().is_empty() {
                return Err("ttl.prefixes cannot contain an empty prefix".to_string());
            }
            if *secs == 0 || *secs > MAX_TTL_SECS {
                return Err(format!(
                    "ttl.prefixes.{} must be between 1 and 2592000 seconds",
                    prefix
                ));
            }
        }

        if self.health.key_prefix.trim().is_empty() {
            return Err("health.key_prefix cannot be empty".to_string());
        }
        if !(1..=3600).contains(&self.health.sentinel_ttl_secs) {
            return Err("health.sentinel_ttl_secs must be between 1 and 3600 seconds".to_string());
        }
        let ratio = self.health.memory_degraded_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err("health.memory_degraded_ratio must be in (0, 1]".to_string());
        }

        let warmup = &self.warmup;
        if warmup.timeout_seconds == 0 {
            return Err("warmup.timeout_seconds cannot be zero".to_string());
        }
        if warmup.concurrency == 0 || warmup.concurrency > 256 {
            return Err("warmup.concurrency must be between 1 and 256".to_string());
        }
        if warmup.predictive_top_n == 0 {
            return Err("warmup.predictive_top_n cannot be zero".to_string());
        }
        warmup.scheduled_time().map_err(|e| e.to_string())?;

        Ok(())
    }
}
