//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 为任意后端存储增加命令超时与瞬时故障重试的装饰器。

use super::CacheStore;
use crate::config::StoreConfig;
use crate::error::{StoreFault, StoreResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// 计算重试延迟（指数退避）
pub fn calculate_retry_delay(attempt: u32, base_delay_ms: u64) -> Duration {
    let factor = 2_u64.saturating_pow(attempt);
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}

/// 带超时与重试的存储
///
/// 每次调用都受 `command_timeout` 限制；超时和连接故障按
/// `max_retries` 次数重试，命令错误直接返回
pub struct GuardedStore {
    inner: Arc<dyn CacheStore>,
    command_timeout: Duration,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl GuardedStore {
    pub fn new(inner: Arc<dyn CacheStore>, command_timeout: Duration) -> Self {
        Self {
            inner,
            command_timeout,
            max_retries: 0,
            retry_base_delay_ms: 50,
        }
    }

    /// 按存储配置创建
    pub fn from_config(inner: Arc<dyn CacheStore>, config: &StoreConfig) -> Self {
        Self::new(inner, config.command_timeout())
            .with_retries(config.max_retries, config.retry_base_delay_ms)
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    async fn guarded<T, F, Fut>(&self, op: &'static str, call: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let timeout_ms = self.command_timeout.as_millis() as u64;
        let mut attempt = 0u32;
        loop {
            let outcome = match timeout(self.command_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreFault::Timeout(timeout_ms)),
            };

            match outcome {
                Err(fault) if fault.is_transient() && attempt < self.max_retries => {
                    let delay = calculate_retry_delay(attempt, self.retry_base_delay_ms);
                    warn!(
                        "{} {} failed (attempt {}/{}): {}, retrying in {:?}",
                        self.inner.name(),
                        op,
                        attempt + 1,
                        self.max_retries + 1,
                        fault,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl CacheStore for GuardedStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.guarded("GET", || self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.guarded("SET", || self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.guarded("DEL", || self.inner.delete(key)).await
    }

    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.guarded("SCAN", || self.inner.scan(pattern)).await
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
        self.guarded("DEL", || self.inner.delete_many(keys)).await
    }

    async fn memory_info(&self) -> StoreResult<String> {
        self.guarded("INFO", || self.inner.memory_info()).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
