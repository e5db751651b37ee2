//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的错误类型和处理机制。

use thiserror::Error;

/// 后端存储故障
///
/// 存储适配器的显式结果类型，执行器根据故障类别决定降级或上抛
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    /// 命令在限定时间内未完成
    #[error("store operation timed out after {0}ms")]
    Timeout(u64),

    /// Redis客户端报告的超时，时长由客户端决定
    #[error("store operation timed out: {0}")]
    ServerTimeout(String),

    /// 连接建立失败或连接中断
    #[error("store connection failed: {0}")]
    Connection(String),

    /// 服务端拒绝或无法解析的命令
    #[error("store command failed: {0}")]
    Command(String),
}

impl StoreFault {
    /// 是否为瞬时故障（超时、连接错误），可以重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreFault::Timeout(_) | StoreFault::ServerTimeout(_) | StoreFault::Connection(_)
        )
    }
}

impl From<redis::RedisError> for StoreFault {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            StoreFault::ServerTimeout(e.to_string())
        } else if e.is_io_error()
            || e.is_connection_refusal()
            || e.is_connection_dropped()
            || e.is_unrecoverable_error()
        {
            StoreFault::Connection(e.to_string())
        } else {
            StoreFault::Command(e.to_string())
        }
    }
}

/// 存储适配器结果类型别名
pub type StoreResult<T> = std::result::Result<T, StoreFault>;

/// 缓存系统错误类型枚举
///
/// 定义了缓存系统中可能发生的各种错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    /// 参数校验失败（空键、零TTL、空模式等），在任何网络调用之前返回
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 后端存储故障
    #[error("Store error: {0}")]
    Store(#[from] StoreFault),

    /// 失效操作失败，附带使用的匹配模式
    #[error("Cache invalidation failed for pattern '{pattern}': {source}")]
    Invalidation {
        pattern: String,
        #[source]
        source: StoreFault,
    },

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;
