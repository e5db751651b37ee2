//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了后端存储的健康探针。
//!
//! 探针写入一个短TTL的哨兵键，读回校验后删除，再查询内存容量。
//! 任何故障都体现在返回的状态中，不会以错误的形式抛出。

use crate::backend::CacheStore;
use crate::config::HealthConfig;
use crate::error::{StoreFault, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// 哨兵键写入的值
const SENTINEL_VALUE: &str = "health_test";

/// 健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthState {
    /// 所有检查通过
    Healthy,
    /// 读写正常，但清理、容量查询失败或内存压力过高
    Degraded,
    /// 无法完成读写往返
    Unhealthy,
}

/// 健康检查结果
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub status: HealthState,
    pub details: BTreeMap<String, Value>,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// 读取布尔类型的详情项
    pub fn detail_flag(&self, name: &str) -> Option<bool> {
        self.details.get(name).and_then(Value::as_bool)
    }
}

/// 检查过程中累积的状态
struct Report {
    state: HealthState,
    details: BTreeMap<String, Value>,
}

impl Report {
    fn new() -> Self {
        Self {
            state: HealthState::Healthy,
            details: BTreeMap::new(),
        }
    }

    fn put(&mut self, name: &str, value: impl Into<Value>) {
        self.details.insert(name.to_string(), value.into());
    }

    /// 记录失败步骤，状态只会变差
    fn fail(&mut self, check: &str, state: HealthState, error: impl ToString) {
        if !self.details.contains_key("failed_check") {
            self.put("failed_check", check);
            self.put("error", error.to_string());
        }
        if state == HealthState::Unhealthy || self.state == HealthState::Healthy {
            self.state = state;
        }
    }
}

/// 健康探针
pub struct HealthProbe {
    store: Arc<dyn CacheStore>,
    config: HealthConfig,
    command_timeout: Duration,
}

impl HealthProbe {
    pub fn new(store: Arc<dyn CacheStore>, config: HealthConfig, command_timeout: Duration) -> Self {
        Self {
            store,
            config,
            command_timeout,
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match timeout(self.command_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreFault::Timeout(self.command_timeout.as_millis() as u64)),
        }
    }

    /// 执行一次健康检查
    #[instrument(skip(self), level = "debug", fields(store = self.store.name()))]
    pub async fn check_health(&self) -> HealthStatus {
        let started = Instant::now();
        let key = format!("{}_{}", self.config.key_prefix, uuid::Uuid::new_v4());
        let ttl = Duration::from_secs(self.config.sentinel_ttl_secs);
        let mut report = Report::new();

        if let Err(e) = self.bounded(self.store.set(&key, SENTINEL_VALUE, ttl)).await {
            report.put("redis_connectivity", false);
            report.put("test_operation_success", false);
            report.fail("write", HealthState::Unhealthy, e);
            return self.finish(report, started);
        }

        match self.bounded(self.store.get(&key)).await {
            Ok(read_back) => {
                report.put("redis_connectivity", true);
                let matches = read_back.as_deref() == Some(SENTINEL_VALUE);
                report.put("test_operation_success", matches);
                if !matches {
                    report.fail(
                        "verify",
                        HealthState::Unhealthy,
                        format!("sentinel read back as {:?}", read_back),
                    );
                }
            }
            Err(e) => {
                report.put("redis_connectivity", false);
                report.put("test_operation_success", false);
                report.fail("read", HealthState::Unhealthy, e);
            }
        }

        match self.bounded(self.store.delete(&key)).await {
            Ok(_) => report.put("cleanup_success", true),
            Err(e) => {
                report.put("cleanup_success", false);
                report.fail("cleanup", HealthState::Degraded, e);
            }
        }

        if report.state != HealthState::Unhealthy {
            self.check_capacity(&mut report).await;
        }

        self.finish(report, started)
    }

    async fn check_capacity(&self, report: &mut Report) {
        let info = match self.bounded(self.store.memory_info()).await {
            Ok(info) => info,
            Err(e) => {
                report.put("capacity_check", false);
                report.fail("capacity", HealthState::Degraded, e);
                return;
            }
        };

        report.put("capacity_check", true);
        let used = info_field(&info, "used_memory");
        let max = info_field(&info, "maxmemory");
        report.put("redis_memory_info", info.trim().to_string());
        if let Some(used) = used {
            report.put("used_memory", used);
        }
        if let Some(max) = max {
            report.put("maxmemory", max);
        }

        // maxmemory 为 0 表示不限制
        if let (Some(used), Some(max)) = (used, max) {
            if max > 0 {
                let ratio = used as f64 / max as f64;
                report.put("memory_usage_ratio", json!(ratio));
                if ratio >= self.config.memory_degraded_ratio {
                    report.fail(
                        "memory_pressure",
                        HealthState::Degraded,
                        format!("memory usage ratio {:.2} exceeds threshold", ratio),
                    );
                }
            }
        }
    }

    fn finish(&self, mut report: Report, started: Instant) -> HealthStatus {
        report.put("latency_ms", started.elapsed().as_millis() as u64);
        let status = report.state;
        match status {
            HealthState::Healthy => debug!("Health check passed"),
            _ => warn!(
                "Health check reported {:?}: {:?}",
                status,
                report.details.get("error")
            ),
        }
        HealthStatus {
            is_healthy: status == HealthState::Healthy,
            status,
            details: report.details,
            checked_at: Utc::now(),
        }
    }
}

/// 从 `INFO` 输出中解析数值字段
fn info_field(info: &str, name: &str) -> Option<u64> {
    info.lines().find_map(|line| {
        let (field, value) = line.trim().split_once(':')?;
        if field == name {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
