//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。

#![allow(dead_code)]

use async_trait::async_trait;
use ctxcache::backend::{CacheStore, MemoryStore};
use ctxcache::config::Config;
use ctxcache::error::{StoreFault, StoreResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 测试使用的Redis地址，优先读取 REDIS_URL
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// 检查Redis是否可用
///
/// 尝试连接并发送PING，1秒内无响应视为不可用
pub async fn is_redis_available() -> bool {
    let Ok(client) = redis::Client::open(redis_url()) else {
        return false;
    };
    let probe = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await
    };
    matches!(
        tokio::time::timeout(Duration::from_secs(1), probe).await,
        Ok(Ok(_))
    )
}

/// 生成唯一的社区标识，保证测试之间的隔离
pub fn unique_community(base: &str) -> String {
    format!("{}{}", base, uuid::Uuid::new_v4().simple())
}

/// 使用内存存储的配置
pub fn memory_config() -> Config {
    let mut config = Config::default();
    config.store.mode = ctxcache::config::StoreMode::Memory;
    config.store.command_timeout_ms = 200;
    config
}

/// 所有操作都返回故障的存储
pub struct FaultyStore {
    pub fault: StoreFault,
    pub calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new(fault: StoreFault) -> Self {
        Self {
            fault,
            calls: AtomicUsize::new(0),
        }
    }

    fn fail<T>(&self) -> StoreResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.fault.clone())
    }
}

#[async_trait]
impl CacheStore for FaultyStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        self.fail()
    }

    async fn scan(&self, _pattern: &str) -> StoreResult<Vec<String>> {
        self.fail()
    }

    async fn delete_many(&self, _keys: &[String]) -> StoreResult<usize> {
        self.fail()
    }

    async fn memory_info(&self) -> StoreResult<String> {
        self.fail()
    }

    fn name(&self) -> &'static str {
        "faulty"
    }
}

/// 所有操作都永不返回的存储，用于验证超时
pub struct HangingStore;

impl HangingStore {
    async fn hang<T>() -> StoreResult<T> {
        std::future::pending::<StoreResult<T>>().await
    }
}

#[async_trait]
impl CacheStore for HangingStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Self::hang().await
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
        Self::hang().await
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Self::hang().await
    }

    async fn scan(&self, _pattern: &str) -> StoreResult<Vec<String>> {
        Self::hang().await
    }

    async fn delete_many(&self, _keys: &[String]) -> StoreResult<usize> {
        Self::hang().await
    }

    async fn memory_info(&self) -> StoreResult<String> {
        Self::hang().await
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

/// 统计读取次数的内存存储，读取可带延迟
pub struct SlowStore {
    pub inner: MemoryStore,
    pub delay: Duration,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CacheStore for SlowStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.inner.scan(pattern).await
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<usize> {
        self.inner.delete_many(keys).await
    }

    async fn memory_info(&self) -> StoreResult<String> {
        self.inner.memory_info().await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}
