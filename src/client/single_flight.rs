//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 同键并发未命中的合并机制。
//!
//! 同一个键同时只有一个调用方（领导者）执行计算，其余调用方等待领导者
//! 完成后重新读取缓存。

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按键合并的并发控制
#[derive(Debug, Default)]
pub struct SingleFlight {
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取键的执行权
    ///
    /// 返回的守卫释放后，下一个等待者才能继续
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = self
            .in_flight
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;
        FlightGuard {
            flight: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// 当前仍有调用方持有或等待的键数量
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// 执行权守卫
///
/// 释放时如果已无其他调用方引用该键，则从表中移除
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.flight
            .in_flight
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
