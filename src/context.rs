//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 文化上下文与失效匹配模式。
//!
//! 上下文只是过滤描述，不会被存储；它按键布局
//! `{data_type}:{community}:{region}:{language}:{discriminator...}`
//! 生成Redis glob模式。

use crate::error::{CacheError, Result};
use crate::key::{normalize_segment, SEGMENT_SEPARATOR};
use serde::{Deserialize, Serialize};

const WILDCARD: &str = "*";

/// 文化缓存上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CulturalCacheContext {
    pub community_id: String,
    pub geographic_region: String,
    pub language: Option<String>,
    pub data_type: Option<String>,
}

impl CulturalCacheContext {
    pub fn new(community_id: impl Into<String>, geographic_region: impl Into<String>) -> Self {
        Self {
            community_id: community_id.into(),
            geographic_region: geographic_region.into(),
            language: None,
            data_type: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }
}

fn segment_or_wildcard(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => normalize_segment(v),
        _ => WILDCARD.to_string(),
    }
}

/// 由上下文生成失效匹配模式
///
/// 未提供的字段使用通配符；社区必须提供，否则模式会匹配所有上下文键
///
/// ```
/// use ctxcache::context::{invalidation_pattern, CulturalCacheContext};
/// let ctx = CulturalCacheContext::new("Buddhist", "Sri Lanka");
/// assert_eq!(invalidation_pattern(&ctx).unwrap(), "*:buddhist:sri%20lanka:*:*");
/// ```
pub fn invalidation_pattern(ctx: &CulturalCacheContext) -> Result<String> {
    if ctx.community_id.trim().is_empty() {
        return Err(CacheError::InvalidArgument(
            "community_id is required for context invalidation".to_string(),
        ));
    }

    let segments = [
        segment_or_wildcard(ctx.data_type.as_deref()),
        normalize_segment(&ctx.community_id),
        segment_or_wildcard(Some(&ctx.geographic_region)),
        segment_or_wildcard(ctx.language.as_deref()),
        WILDCARD.to_string(),
    ];
    Ok(segments.join(&SEGMENT_SEPARATOR.to_string()))
}
