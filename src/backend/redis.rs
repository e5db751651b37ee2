//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的后端存储实现，支持单机与哨兵模式。

use super::redis_provider::{DefaultRedisProvider, RedisProvider};
use super::CacheStore;
use crate::config::{StoreConfig, StoreMode};
use crate::error::{CacheError, Result, StoreResult};
use crate::utils::redaction::redact_cache_key;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Redis后端存储
///
/// 连接管理器负责断线重连与哨兵故障转移，克隆开销很小
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    scan_count: usize,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("scan_count", &self.scan_count)
            .finish()
    }
}

impl RedisStore {
    /// 创建新的Redis存储实例
    ///
    /// # 参数
    ///
    /// * `config` - 后端存储配置
    ///
    /// # 返回值
    ///
    /// 返回新的RedisStore实例或错误
    #[instrument(skip(config), level = "info", name = "init_redis_store")]
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        Self::new_with_provider(config, Arc::new(DefaultRedisProvider)).await
    }

    /// 使用指定的Redis提供者创建实例
    #[instrument(skip(config, provider), level = "info", fields(mode = ?config.mode))]
    pub async fn new_with_provider(
        config: &StoreConfig,
        provider: Arc<dyn RedisProvider>,
    ) -> Result<Self> {
        debug!("Initializing RedisStore with mode: {:?}", config.mode);
        let (_client, manager) = match config.mode {
            StoreMode::Standalone => provider.get_standalone_client(config).await?,
            StoreMode::Sentinel => provider.get_sentinel_client(config).await?,
            StoreMode::Memory => {
                return Err(CacheError::ConfigError(
                    "RedisStore cannot be created for memory mode".to_string(),
                ))
            }
        };
        Ok(Self {
            manager,
            scan_count: config.scan_count.max(1),
        })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    #[instrument(skip_all, level = "debug", fields(key = %redact_cache_key(key)))]
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    #[instrument(skip_all, level = "debug", fields(key = %redact_cache_key(key), value_len = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let ttl_ms = ttl.as_millis().clamp(1, u64::MAX as u128) as u64;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    #[instrument(skip_all, level = "debug", fields(key = %redact_cache_key(key)))]
    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let removed = redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let mut found = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await?;

            found.extend(keys);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN 可能重复返回同一个键
        found.sort();
        found.dedup();
        debug!("SCAN {} matched {} keys", pattern, found.len());
        Ok(found)
    }

    #[instrument(skip(self, keys), level = "debug", fields(key_count = keys.len()))]
    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.manager.clone();
        let removed = redis::cmd("DEL")
            .arg(keys)
            .query_async::<usize>(&mut conn)
            .await?;
        Ok(removed)
    }

    #[instrument(skip(self), level = "debug")]
    async fn memory_info(&self) -> StoreResult<String> {
        let mut conn = self.manager.clone();
        let info = redis::cmd("INFO")
            .arg("memory")
            .query_async::<String>(&mut conn)
            .await?;
        Ok(info)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
