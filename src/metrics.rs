//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的指标收集和监控功能。
//!
//! 指标按逻辑端点累计命中与未命中次数，进程重启或显式重置时清零。

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// 逻辑端点标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EndpointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EndpointId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个端点的计数器
#[derive(Debug, Default)]
struct EndpointCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    faults: AtomicU64,
    /// 最近一次访问的时间戳（毫秒），0 表示从未访问
    last_updated_ms: AtomicI64,
}

impl EndpointCounters {
    fn touch(&self) {
        self.last_updated_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

/// 端点指标快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub endpoint_id: EndpointId,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
    pub total_requests: u64,
    /// 读取时遇到的后端故障次数（同时计入未命中）
    pub fault_count: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CacheMetricsSnapshot {
    fn empty(endpoint_id: EndpointId) -> Self {
        Self {
            endpoint_id,
            hit_count: 0,
            miss_count: 0,
            hit_ratio: 0.0,
            miss_ratio: 0.0,
            total_requests: 0,
            fault_count: 0,
            last_updated: None,
        }
    }
}

/// 指标收集器
///
/// 进程启动时构造一次，通过 `Arc` 显式注入执行器；计数器为原子类型，
/// 可被并发请求安全递增
#[derive(Debug, Default)]
pub struct CacheMetrics {
    endpoints: DashMap<EndpointId, Arc<EndpointCounters>>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, endpoint: &EndpointId) -> Arc<EndpointCounters> {
        if let Some(c) = self.endpoints.get(endpoint) {
            return c.value().clone();
        }
        self.endpoints
            .entry(endpoint.clone())
            .or_default()
            .value()
            .clone()
    }

    /// 记录一次访问
    ///
    /// # 参数
    ///
    /// * `endpoint` - 逻辑端点
    /// * `hit` - 是否命中缓存
    pub fn record_access(&self, endpoint: &EndpointId, hit: bool) {
        let counters = self.counters(endpoint);
        if hit {
            counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        counters.touch();
    }

    /// 记录一次后端故障
    pub fn record_fault(&self, endpoint: &EndpointId) {
        let counters = self.counters(endpoint);
        counters.faults.fetch_add(1, Ordering::Relaxed);
        counters.touch();
    }

    /// 获取端点的指标快照
    ///
    /// 未知端点返回全零快照
    pub fn snapshot(&self, endpoint: &EndpointId) -> CacheMetricsSnapshot {
        match self.endpoints.get(endpoint) {
            Some(c) => Self::build_snapshot(endpoint.clone(), c.value()),
            None => CacheMetricsSnapshot::empty(endpoint.clone()),
        }
    }

    /// 所有端点的快照，按端点排序
    pub fn snapshots(&self) -> Vec<CacheMetricsSnapshot> {
        let mut all: Vec<CacheMetricsSnapshot> = self
            .endpoints
            .iter()
            .map(|entry| Self::build_snapshot(entry.key().clone(), entry.value()))
            .collect();
        all.sort_by(|a, b| a.endpoint_id.cmp(&b.endpoint_id));
        all
    }

    /// 管理性重置单个端点
    pub fn reset(&self, endpoint: &EndpointId) {
        self.endpoints.remove(endpoint);
    }

    fn build_snapshot(endpoint_id: EndpointId, c: &EndpointCounters) -> CacheMetricsSnapshot {
        let hit_count = c.hits.load(Ordering::Relaxed);
        let miss_count = c.misses.load(Ordering::Relaxed);
        let total_requests = hit_count + miss_count;
        let (hit_ratio, miss_ratio) = if total_requests == 0 {
            (0.0, 0.0)
        } else {
            let hit_ratio = hit_count as f64 / total_requests as f64;
            (hit_ratio, 1.0 - hit_ratio)
        };
        let last_updated = match c.last_updated_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        };

        CacheMetricsSnapshot {
            endpoint_id,
            hit_count,
            miss_count,
            hit_ratio,
            miss_ratio,
            total_requests,
            fault_count: c.faults.load(Ordering::Relaxed),
            last_updated,
        }
    }

    /// 获取指标字符串
    ///
    /// 以Prometheus文本格式输出所有端点的指标，用于监控系统采集
    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();
        for s in self.snapshots() {
            output.push_str(&format!(
                "ctxcache_requests_total{{endpoint=\"{}\", result=\"hit\"}} {}\n",
                s.endpoint_id, s.hit_count
            ));
            output.push_str(&format!(
                "ctxcache_requests_total{{endpoint=\"{}\", result=\"miss\"}} {}\n",
                s.endpoint_id, s.miss_count
            ));
            output.push_str(&format!(
                "ctxcache_store_faults_total{{endpoint=\"{}\"}} {}\n",
                s.endpoint_id, s.fault_count
            ));
            output.push_str(&format!(
                "ctxcache_hit_ratio{{endpoint=\"{}\"}} {}\n",
                s.endpoint_id, s.hit_ratio
            ));
        }
        output
    }
}
