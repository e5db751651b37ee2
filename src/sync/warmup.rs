//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存预热调度。
//!
//! 预热是尽力而为的后台工作：`warm` 从不返回错误，单个键的加载失败只计数。

use crate::client::aside::query_ttl;
use crate::client::CacheAside;
use crate::config::WarmupConfig;
use crate::error::Result;
use crate::key::CacheKey;
use crate::metrics::EndpointId;
use crate::query::KeyedQuery;
use crate::utils::redaction::redact_cache_key;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 预热策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmingStrategy {
    /// 立即执行，完成后返回
    Immediate,
    /// 后台执行，调用方不等待
    Background,
    /// 在配置的时刻执行
    Scheduled,
    /// 按历史未命中次数挑选键后在后台执行
    Predictive,
}

/// 需要预热的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmKey {
    pub key: CacheKey,
    /// `None` 时按TTL策略取值
    pub ttl: Option<Duration>,
    /// 指标端点，`None` 时取键的类型标识段
    pub endpoint: Option<EndpointId>,
}

impl WarmKey {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            ttl: None,
            endpoint: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<EndpointId>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// 使用查询自身的键、TTL和端点
    pub fn from_query<Q: KeyedQuery + ?Sized>(query: &Q) -> Self {
        Self {
            key: query.cache_key(),
            ttl: query_ttl(query),
            endpoint: Some(query.endpoint()),
        }
    }

    /// 记录该键访问指标的端点
    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
            .clone()
            .unwrap_or_else(|| EndpointId::from(self.key.discriminator()))
    }
}

/// 预热数据来源
///
/// 由应用提供：列出某个范围内值得预热的键，并计算每个键的值
#[async_trait]
pub trait WarmupSource: Send + Sync {
    /// 范围内的候选键，按重要性排序
    async fn candidates(&self, scope: &str) -> Result<Vec<WarmKey>>;

    /// 计算键对应的值
    async fn load(&self, key: &WarmKey) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WarmupStatus {
    Pending,
    InProgress { progress: usize, total: usize },
    Completed { loaded: usize, failed: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarmupResult {
    pub loaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success: bool,
}

impl WarmupResult {
    pub fn skipped() -> Self {
        Self {
            loaded: 0,
            failed: 0,
            skipped: 1,
            success: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            loaded: 0,
            failed: 0,
            skipped: 0,
            success: false,
        }
    }
}

/// `warm` 的返回值，说明工作如何被安排
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WarmupTicket {
    /// 立即预热已完成
    Completed(WarmupResult),
    /// 已在后台启动
    Spawned,
    /// 已登记在指定时刻执行
    Scheduled { at: DateTime<Utc> },
    /// 预热被禁用或没有数据来源
    Skipped,
}

/// 计算下一次执行时刻（UTC）
///
/// 今天的时刻已过（含恰好相等）时取明天
pub fn next_occurrence(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

struct WarmupCore {
    cache: Arc<CacheAside>,
    config: WarmupConfig,
    source: Option<Arc<dyn WarmupSource>>,
    status: RwLock<HashMap<String, WarmupStatus>>,
    shutdown: CancellationToken,
}

/// 预热调度器
///
/// 克隆开销很小，所有克隆共享同一组任务
#[derive(Clone)]
pub struct WarmupScheduler {
    core: Arc<WarmupCore>,
    scheduled: Arc<DashMap<String, JoinHandle<()>>>,
}

impl WarmupScheduler {
    pub fn new(cache: Arc<CacheAside>, config: WarmupConfig) -> Self {
        Self {
            core: Arc::new(WarmupCore {
                cache,
                config,
                source: None,
                status: RwLock::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
            scheduled: Arc::new(DashMap::new()),
        }
    }

    /// 设置数据来源
    pub fn with_source(self, source: Arc<dyn WarmupSource>) -> Self {
        let core = WarmupCore {
            cache: self.core.cache.clone(),
            config: self.core.config.clone(),
            source: Some(source),
            status: RwLock::new(HashMap::new()),
            shutdown: self.core.shutdown.clone(),
        };
        Self {
            core: Arc::new(core),
            scheduled: self.scheduled,
        }
    }

    /// 预热一个范围
    ///
    /// # 参数
    ///
    /// * `scope` - 预热范围（例如社区标识）
    /// * `strategy` - 预热策略
    ///
    /// # 返回值
    ///
    /// 返回说明工作如何被安排的票据，从不失败
    #[instrument(skip(self), level = "info")]
    pub async fn warm(&self, scope: &str, strategy: WarmingStrategy) -> WarmupTicket {
        if !self.core.config.enabled || self.core.source.is_none() {
            info!("Cache warmup is disabled or has no source, skipping");
            return WarmupTicket::Skipped;
        }
        if self.core.shutdown.is_cancelled() {
            warn!("Warmup scheduler is shut down, skipping {}", scope);
            return WarmupTicket::Skipped;
        }

        match strategy {
            WarmingStrategy::Immediate => {
                WarmupTicket::Completed(self.core.run(scope, false).await)
            }
            WarmingStrategy::Background => {
                self.spawn(scope, false);
                WarmupTicket::Spawned
            }
            WarmingStrategy::Predictive => {
                self.spawn(scope, true);
                WarmupTicket::Spawned
            }
            WarmingStrategy::Scheduled => self.schedule(scope).await,
        }
    }

    fn spawn(&self, scope: &str, predictive: bool) {
        let core = self.core.clone();
        let scope = scope.to_string();
        tokio::spawn(async move {
            let token = core.shutdown.clone();
            tokio::select! {
                _ = token.cancelled() => debug!("Warmup for {} cancelled", scope),
                _ = core.run(&scope, predictive) => {}
            }
        });
    }

    async fn schedule(&self, scope: &str) -> WarmupTicket {
        let at = match self.core.config.scheduled_time() {
            Ok(time) => next_occurrence(Utc::now(), time),
            Err(e) => {
                warn!("Cannot schedule warmup for {}: {}", scope, e);
                return WarmupTicket::Skipped;
            }
        };
        let delay = (at - Utc::now()).to_std().unwrap_or_default();

        self.core.set_status(scope, WarmupStatus::Pending).await;

        let core = self.core.clone();
        let owned_scope = scope.to_string();
        let handle = tokio::spawn(async move {
            let token = core.shutdown.clone();
            tokio::select! {
                _ = token.cancelled() => debug!("Scheduled warmup for {} cancelled", owned_scope),
                _ = async {
                    tokio::time::sleep(delay).await;
                    core.run(&owned_scope, false).await
                } => {}
            }
        });

        // 同一范围重复登记时替换之前的任务
        if let Some(previous) = self.scheduled.insert(scope.to_string(), handle) {
            previous.abort();
        }
        info!("Scheduled warmup for {} at {}", scope, at);
        WarmupTicket::Scheduled { at }
    }

    /// 查询范围的预热状态
    pub async fn status(&self, scope: &str) -> WarmupStatus {
        self.core
            .status
            .read()
            .await
            .get(scope)
            .cloned()
            .unwrap_or(WarmupStatus::Pending)
    }

    /// 取消所有后台与定时预热
    pub fn shutdown(&self) {
        self.core.shutdown.cancel();
        for entry in self.scheduled.iter() {
            entry.value().abort();
        }
        self.scheduled.clear();
    }
}

impl WarmupCore {
    async fn set_status(&self, scope: &str, status: WarmupStatus) {
        self.status.write().await.insert(scope.to_string(), status);
    }

    async fn run(&self, scope: &str, predictive: bool) -> WarmupResult {
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        self.set_status(
            scope,
            WarmupStatus::InProgress {
                progress: 0,
                total: 0,
            },
        )
        .await;

        match tokio::time::timeout(timeout, self.run_inner(scope, predictive)).await {
            Ok(Ok(result)) => {
                info!(
                    "Cache warmup for {} completed: loaded={}, failed={}",
                    scope, result.loaded, result.failed
                );
                self.set_status(
                    scope,
                    WarmupStatus::Completed {
                        loaded: result.loaded,
                        failed: result.failed,
                    },
                )
                .await;
                result
            }
            Ok(Err(e)) => {
                warn!("Cache warmup for {} failed: {}", scope, e);
                self.set_status(
                    scope,
                    WarmupStatus::Failed {
                        error: e.to_string(),
                    },
                )
                .await;
                WarmupResult::failed()
            }
            Err(_) => {
                warn!(
                    "Cache warmup for {} timed out after {} seconds",
                    scope, self.config.timeout_seconds
                );
                self.set_status(
                    scope,
                    WarmupStatus::Failed {
                        error: "timeout".to_string(),
                    },
                )
                .await;
                WarmupResult::failed()
            }
        }
    }

    async fn run_inner(&self, scope: &str, predictive: bool) -> Result<WarmupResult> {
        let Some(source) = self.source.clone() else {
            return Ok(WarmupResult::skipped());
        };

        let mut candidates = source.candidates(scope).await?;
        if predictive {
            candidates = self.rank_by_misses(candidates);
        }
        let total = candidates.len();
        debug!("Warming {} keys for {}", total, scope);

        let outcomes = stream::iter(candidates)
            .map(|warm_key| {
                let source = source.clone();
                async move { self.warm_one(source.as_ref(), &warm_key).await }
            })
            .buffer_unordered(self.config.concurrency.max(1));
        futures::pin_mut!(outcomes);

        let mut loaded = 0usize;
        let mut failed = 0usize;
        while let Some(ok) = outcomes.next().await {
            if ok {
                loaded += 1;
            } else {
                failed += 1;
            }
            self.set_status(
                scope,
                WarmupStatus::InProgress {
                    progress: loaded + failed,
                    total,
                },
            )
            .await;
        }

        Ok(WarmupResult {
            loaded,
            failed,
            skipped: 0,
            success: failed == 0,
        })
    }

    async fn warm_one(&self, source: &dyn WarmupSource, warm_key: &WarmKey) -> bool {
        let key = warm_key.key.as_str();
        let value = match source.load(warm_key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Warmup: failed to load key {}: {}", redact_cache_key(key), e);
                return false;
            }
        };
        match self.cache.set(key, &value, warm_key.ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Warmup: failed to store key {}: {}", redact_cache_key(key), e);
                false
            }
        }
    }

    /// 按端点的历史未命中次数降序排列，保留前 `predictive_top_n` 个
    fn rank_by_misses(&self, candidates: Vec<WarmKey>) -> Vec<WarmKey> {
        let metrics = self.cache.metrics();
        let mut ranked: Vec<(u64, WarmKey)> = candidates
            .into_iter()
            .map(|k| (metrics.snapshot(&k.endpoint()).miss_count, k))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked
            .into_iter()
            .take(self.config.predictive_top_n)
            .map(|(_, k)| k)
            .collect()
    }
}
