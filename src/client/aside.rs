//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 旁路缓存执行器。
//!
//! 读取命中直接返回；未命中时执行计算并回写。后端故障不会传递给调用方，
//! 只要计算本身成功，调用方总能拿到正确的值。

use super::single_flight::SingleFlight;
use crate::backend::CacheStore;
use crate::error::{CacheError, Result, StoreFault};
use crate::key::{discriminator_of, validate_key};
use crate::metrics::{CacheMetrics, EndpointId};
use crate::query::{KeyedQuery, TtlPolicy};
use crate::serialization::{Serializer, SerializerEnum};
use crate::utils::redaction::redact_cache_key;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 单次读取的结果
enum Lookup<T> {
    Hit(T),
    Miss,
    /// 缓存中的值无法解码，按未命中处理并覆盖
    Undecodable,
    Fault(StoreFault),
}

/// 旁路缓存执行器
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    serializer: SerializerEnum,
    metrics: Arc<CacheMetrics>,
    ttl_policy: TtlPolicy,
    single_flight: Option<SingleFlight>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            store,
            serializer: SerializerEnum::default(),
            metrics,
            ttl_policy: TtlPolicy::default(),
            single_flight: None,
        }
    }

    pub fn with_ttl_policy(mut self, ttl_policy: TtlPolicy) -> Self {
        self.ttl_policy = ttl_policy;
        self
    }

    pub fn with_serializer(mut self, serializer: SerializerEnum) -> Self {
        self.serializer = serializer;
        self
    }

    /// 启用同键未命中合并
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled.then(SingleFlight::new);
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl_policy
    }

    /// 读取或计算
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键，不能为空
    /// * `ttl` - 生存时间，`None` 时按TTL策略取值
    /// * `factory` - 未命中时执行的计算
    ///
    /// # 返回值
    ///
    /// 命中时返回缓存值且不执行 `factory`；否则返回 `factory` 的结果。
    /// `factory` 的错误原样返回，此时不写入缓存
    #[instrument(skip_all, level = "debug", fields(key = %redact_cache_key(key)))]
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
        validate_key(key)?;
        let ttl = self.resolve_ttl(key, ttl)?;
        let endpoint = EndpointId::from(discriminator_of(key));
        self.execute(key, &endpoint, ttl, factory).await
    }

    /// 按查询自身的键、TTL和端点执行读取或计算
    #[instrument(skip_all, level = "debug")]
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
        let key = query.cache_key();
        validate_key(key.as_str())?;
        let ttl = self.resolve_ttl(key.as_str(), query_ttl(query))?;
        self.execute(key.as_str(), &query.endpoint(), ttl, factory)
            .await
    }

    async fn execute<T, E, F, Fut>(
        &self,
        key: &str,
        endpoint: &EndpointId,
        ttl: Duration,
        factory: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut lookup = self.lookup::<T>(key).await;

        // 领导者释放前，其他调用方在此等待，随后重新读取
        let needs_flight = matches!(lookup, Lookup::Miss | Lookup::Undecodable);
        let _flight = match &self.single_flight {
            Some(flight) if needs_flight => {
                let guard = flight.acquire(key).await;
                lookup = self.lookup::<T>(key).await;
                Some(guard)
            }
            _ => None,
        };

        let write_back = match lookup {
            Lookup::Hit(value) => {
                self.metrics.record_access(endpoint, true);
                debug!("cache hit");
                return Ok(value);
            }
            Lookup::Fault(fault) => {
                warn!(
                    "Cache read failed for key {}, computing directly: {}",
                    redact_cache_key(key),
                    fault
                );
                self.metrics.record_access(endpoint, false);
                self.metrics.record_fault(endpoint);
                false
            }
            Lookup::Miss | Lookup::Undecodable => {
                self.metrics.record_access(endpoint, false);
                true
            }
        };

        let value = factory().await?;

        if write_back {
            self.write_back(key, &value, ttl).await;
        }
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        match self.store.get(key).await {
            Ok(Some(payload)) => match self.serializer.deserialize::<T>(&payload) {
                Ok(value) => Lookup::Hit(value),
                Err(e) => {
                    warn!(
                        "Cached payload for key {} could not be decoded, treating as miss: {}",
                        redact_cache_key(key),
                        e
                    );
                    Lookup::Undecodable
                }
            },
            Ok(None) => Lookup::Miss,
            Err(fault) => Lookup::Fault(fault),
        }
    }

    /// 尽力回写，失败只记录日志
    async fn write_back<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let payload = match self.serializer.serialize(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    "Failed to serialize value for key {}, returning uncached: {}",
                    redact_cache_key(key),
                    e
                );
                return;
            }
        };
        if let Err(fault) = self.store.set(key, &payload, ttl).await {
            warn!(
                "Failed to write value to cache for key {}: {}",
                redact_cache_key(key),
                fault
            );
        }
    }

    /// 只读访问
    ///
    /// 未命中、后端故障或无法解码时返回 `Ok(None)`，只有空键会返回错误
    #[instrument(skip_all, level = "debug", fields(key = %redact_cache_key(key)))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;
        let endpoint = EndpointId::from(discriminator_of(key));
        match self.lookup::<T>(key).await {
            Lookup::Hit(value) => {
                self.metrics.record_access(&endpoint, true);
                Ok(Some(value))
            }
            Lookup::Miss | Lookup::Undecodable => {
                self.metrics.record_access(&endpoint, false);
                Ok(None)
            }
            Lookup::Fault(fault) => {
                warn!("Cache read failed for key {}: {}", redact_cache_key(key), fault);
                self.metrics.record_access(&endpoint, false);
                self.metrics.record_fault(&endpoint);
                Ok(None)
            }
        }
    }

    /// 无条件写入，后端故障会返回给调用方
    #[instrument(skip_all, level = "debug", fields(key = %redact_cache_key(key)))]
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        validate_key(key)?;
        let ttl = self.resolve_ttl(key, ttl)?;
        let payload = self.serializer.serialize(value)?;
        self.store.set(key, &payload, ttl).await?;
        Ok(())
    }

    /// 无条件删除，返回键是否存在
    #[instrument(skip_all, level = "debug", fields(key = %redact_cache_key(key)))]
    pub async fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.store.delete(key).await?)
    }

    fn resolve_ttl(&self, key: &str, ttl: Option<Duration>) -> Result<Duration> {
        let ttl = ttl.unwrap_or_else(|| self.ttl_policy.ttl_for_key(key));
        if ttl.is_zero() {
            return Err(CacheError::InvalidArgument(
                "Cache TTL must be greater than zero".to_string(),
            ));
        }
        Ok(ttl)
    }
}

/// 查询自身固定的TTL，未固定时返回 `None`
pub(crate) fn query_ttl<Q: KeyedQuery + ?Sized>(query: &Q) -> Option<Duration> {
    query.has_fixed_ttl().then(|| query.cache_ttl())
}
