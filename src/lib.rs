//! ctxcache - 按文化上下文划分的分布式旁路缓存
//!
//! 在昂贵的查询前提供读取或计算、按上下文失效、后端故障降级，
//! 以及命中率指标、健康探针和预热调度。

#![doc(html_root_url = "https://docs.rs/ctxcache/0.1.0")]

extern crate self as ctxcache;

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod key;
pub mod metrics;
pub mod query;
pub mod serialization;
pub mod service;
pub mod sync;
pub mod telemetry;
pub mod utils;

pub use backend::{CacheStore, GuardedStore, MemoryStore, RedisStore};
pub use client::CacheAside;
pub use config::Config;
pub use context::{invalidation_pattern, CulturalCacheContext};
pub use ctxcache_macros::KeyedQuery;
pub use error::{CacheError, Result, StoreFault};
pub use health::{HealthProbe, HealthState, HealthStatus};
pub use key::{CacheKey, KeyBuilder, KeySegment};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot, EndpointId};
pub use query::{KeyedQuery, TtlPolicy};
pub use service::CacheService;
pub use sync::invalidation::{ContextInvalidator, InvalidationReport};
pub use sync::warmup::{
    WarmKey, WarmingStrategy, WarmupResult, WarmupScheduler, WarmupSource, WarmupStatus,
    WarmupTicket,
};

/// ctxcache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
