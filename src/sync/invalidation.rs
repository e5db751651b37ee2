//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按上下文和模式进行的缓存失效。
//!
//! 与读取路径不同，失效的后端故障一律返回给调用方：漏掉的失效会留下陈旧数据。

use crate::backend::CacheStore;
use crate::context::{invalidation_pattern, CulturalCacheContext};
use crate::error::{CacheError, Result, StoreResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 失效结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    /// 实际使用的匹配模式
    pub pattern: String,
    /// 删除的键数量
    pub removed: usize,
}

/// 上下文失效器
pub struct ContextInvalidator {
    store: Arc<dyn CacheStore>,
}

impl ContextInvalidator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// 删除与上下文匹配的所有缓存项
    ///
    /// 没有匹配项时返回 `removed = 0`
    #[instrument(skip(self), level = "info")]
    pub async fn invalidate_by_context(
        &self,
        ctx: &CulturalCacheContext,
    ) -> Result<InvalidationReport> {
        let pattern = invalidation_pattern(ctx)?;
        let removed = self.remove_pattern(&pattern).await?;
        Ok(InvalidationReport { pattern, removed })
    }

    /// 删除与模式匹配的所有缓存项
    ///
    /// # 参数
    ///
    /// * `pattern` - Redis glob模式
    ///
    /// # 返回值
    ///
    /// 返回删除的键数量
    #[instrument(skip(self), level = "info")]
    pub async fn remove_pattern(&self, pattern: &str) -> Result<usize> {
        if pattern.trim().is_empty() {
            return Err(CacheError::InvalidArgument(
                "Pattern cannot be null or empty".to_string(),
            ));
        }

        match self.scan_and_delete(pattern).await {
            Ok(removed) => {
                info!("Removed {} cache entries matching {}", removed, pattern);
                Ok(removed)
            }
            Err(source) => {
                warn!("Invalidation for pattern {} failed: {}", pattern, source);
                Err(CacheError::Invalidation {
                    pattern: pattern.to_string(),
                    source,
                })
            }
        }
    }

    async fn scan_and_delete(&self, pattern: &str) -> StoreResult<usize> {
        let keys = self.store.scan(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.store.delete_many(&keys).await
    }
}
