//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的后端存储抽象及其实现。
//!
//! 执行器只依赖 [`CacheStore`] 提供的几个原语；每个原语都返回显式的
//! [`StoreFault`](crate::error::StoreFault)，由调用方决定降级还是上抛。

pub mod guarded;
pub mod memory;
pub mod redis;
pub mod redis_provider;

pub use guarded::GuardedStore;
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use redis_provider::{DefaultRedisProvider, RedisProvider};

use crate::error::StoreResult;
use async_trait::async_trait;
use std::time::Duration;

/// 后端存储接口
///
/// 值以文本形式存储；写入是单条原子命令，不会出现部分写入
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 读取键，不存在时返回 `None`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 写入键值并设置过期时间
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// 删除键，返回键是否存在
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// 按glob模式枚举所有匹配的键
    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// 批量删除，返回实际删除的数量
    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize>;

    /// 内存信息（`INFO memory` 格式）
    async fn memory_info(&self) -> StoreResult<String>;

    /// 后端名称，用于日志
    fn name(&self) -> &'static str;
}
