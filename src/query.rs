//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了可缓存查询的契约以及按键类型选择TTL的策略。

use crate::config::TtlConfig;
use crate::key::{discriminator_of, CacheKey};
use crate::metrics::EndpointId;
use std::collections::HashMap;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// 可缓存的查询
///
/// 缓存层只需要调用方提供这两个钩子
pub trait KeyedQuery {
    /// 由识别字段确定性派生的缓存键
    fn cache_key(&self) -> CacheKey;

    /// 该查询结果的生存时间
    fn cache_ttl(&self) -> Duration;

    /// `cache_ttl` 是否为查询自身固定的值
    ///
    /// 返回 `false` 时执行器改用其配置的TTL策略
    fn has_fixed_ttl(&self) -> bool {
        true
    }

    /// 指标端点，默认取键的类型标识段
    fn endpoint(&self) -> EndpointId {
        EndpointId::from(self.cache_key().discriminator())
    }
}

/// TTL策略
///
/// 按键的第一段（类型标识）查找TTL，未命中时使用默认值
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    default_ttl: Duration,
    by_prefix: HashMap<String, Duration>,
}

impl Default for TtlPolicy {
    /// 内置策略：日历数据较稳定，互动类数据需要保持新鲜
    fn default() -> Self {
        let by_prefix = [
            ("cal", 30 * DAY),
            ("cal_buddhist", 30 * DAY),
            ("cal_hindu", 30 * DAY),
            ("cultural_score", 4 * HOUR),
            ("diaspora_analytics", HOUR),
            ("event_recommendations", 30 * MINUTE),
            ("cultural_content", 12 * HOUR),
            ("business_directory", 6 * HOUR),
            ("community_engagement", 15 * MINUTE),
        ]
        .into_iter()
        .map(|(prefix, secs)| (prefix.to_string(), Duration::from_secs(secs)))
        .collect();

        Self {
            default_ttl: Duration::from_secs(HOUR),
            by_prefix,
        }
    }
}

impl TtlPolicy {
    /// 在内置策略之上应用配置中的覆盖项
    pub fn from_config(config: &TtlConfig) -> Self {
        let mut policy = Self::default();
        policy.default_ttl = Duration::from_secs(config.default_secs);
        for (prefix, secs) in &config.prefixes {
            policy
                .by_prefix
                .insert(prefix.trim().to_lowercase(), Duration::from_secs(*secs));
        }
        policy
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 返回键对应的TTL
    pub fn ttl_for_key(&self, key: &str) -> Duration {
        let prefix = discriminator_of(key).to_lowercase();
        self.by_prefix
            .get(&prefix)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}
