//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存服务门面，组合执行器、失效器、健康探针与预热调度器。
//!
//! 服务不依赖任何全局状态：进程启动时构造一次，通过 `Arc` 共享给请求处理方。

use crate::backend::{CacheStore, GuardedStore, MemoryStore, RedisStore};
use crate::client::CacheAside;
use crate::config::{Config, StoreMode};
use crate::context::CulturalCacheContext;
use crate::error::{CacheError, Result};
use crate::health::{HealthProbe, HealthStatus};
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot, EndpointId};
use crate::query::{KeyedQuery, TtlPolicy};
use crate::sync::invalidation::{ContextInvalidator, InvalidationReport};
use crate::sync::warmup::{WarmingStrategy, WarmupScheduler, WarmupSource, WarmupStatus, WarmupTicket};
use crate::utils::redaction::redact_connection_string;
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// 缓存服务
pub struct CacheService {
    config: Config,
    cache: Arc<CacheAside>,
    invalidator: ContextInvalidator,
    health: HealthProbe,
    warmup: WarmupScheduler,
}

impl CacheService {
    /// 按配置连接后端存储并创建服务
    ///
    /// # 参数
    ///
    /// * `config` - 缓存配置
    ///
    /// # 返回值
    ///
    /// 返回服务实例；配置无效或无法连接时返回错误
    #[instrument(skip(config), level = "info", fields(mode = ?config.store.mode))]
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;

        let store: Arc<dyn CacheStore> = match config.store.mode {
            StoreMode::Memory => Arc::new(MemoryStore::new()),
            StoreMode::Standalone | StoreMode::Sentinel => {
                Arc::new(RedisStore::new(&config.store).await?)
            }
        };
        info!(
            "Cache service connected to {} ({})",
            store.name(),
            redact_connection_string(config.store.connection_string.expose_secret())
        );
        Ok(Self::with_store(config, store))
    }

    /// 使用已有的后端存储创建服务
    ///
    /// 存储会被包装上命令超时与重试
    pub fn with_store(config: Config, store: Arc<dyn CacheStore>) -> Self {
        let guarded: Arc<dyn CacheStore> =
            Arc::new(GuardedStore::from_config(store, &config.store));
        let metrics = Arc::new(CacheMetrics::new());

        let cache = Arc::new(
            CacheAside::new(guarded.clone(), metrics)
                .with_ttl_policy(TtlPolicy::from_config(&config.ttl))
                .with_single_flight(config.executor.single_flight),
        );
        let invalidator = ContextInvalidator::new(guarded.clone());
        let health = HealthProbe::new(
            guarded,
            config.health.clone(),
            config.store.command_timeout(),
        );
        let warmup = WarmupScheduler::new(cache.clone(), config.warmup.clone());

        Self {
            config,
            cache,
            invalidator,
            health,
            warmup,
        }
    }

    /// 设置预热数据来源
    pub fn with_warmup_source(mut self, source: Arc<dyn WarmupSource>) -> Self {
        self.warmup = self.warmup.with_source(source);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheAside> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        self.cache.metrics()
    }

    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.cache.get_or_set(key, ttl, factory).await
    }

    pub async fn get_or_compute<Q, T, E, F, Fut>(
        &self,
        query: &Q,
        factory: F,
    ) -> std::result::Result<T, E>
    where
        Q: KeyedQuery + ?Sized,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.cache.get_or_compute(query, factory).await
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.cache.get(key).await
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.cache.set(key, value, ttl).await
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.cache.remove(key).await
    }

    pub async fn invalidate_by_context(
        &self,
        ctx: &CulturalCacheContext,
    ) -> Result<InvalidationReport> {
        self.invalidator.invalidate_by_context(ctx).await
    }

    pub async fn remove_pattern(&self, pattern: &str) -> Result<usize> {
        self.invalidator.remove_pattern(pattern).await
    }

    pub fn snapshot(&self, endpoint: &EndpointId) -> CacheMetricsSnapshot {
        self.metrics().snapshot(endpoint)
    }

    pub async fn check_health(&self) -> HealthStatus {
        self.health.check_health().await
    }

    pub async fn warm(&self, scope: &str, strategy: WarmingStrategy) -> WarmupTicket {
        self.warmup.warm(scope, strategy).await
    }

    pub async fn warmup_status(&self, scope: &str) -> WarmupStatus {
        self.warmup.status(scope).await
    }

    /// 取消后台与定时预热
    pub fn shutdown(&self) {
        self.warmup.shutdown();
    }
}
