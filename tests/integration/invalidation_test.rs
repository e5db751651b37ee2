//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 按上下文与模式失效的集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{memory_config, setup_logging};
use ctxcache::backend::{CacheStore, MemoryStore};
use ctxcache::{CacheError, CacheKey, CacheService, CulturalCacheContext};
use std::sync::Arc;
use std::time::Duration;

async fn seeded_service() -> (CacheService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = CacheService::with_store(memory_config(), store.clone());

    let entries = [
        ("cal", "buddhist", "sri_lanka", "si", "2024-05-23"),
        ("cultural_score", "buddhist", "sri_lanka", "en", "42"),
        ("cal", "buddhist", "canada", "en", "2024-05-23"),
        ("cal", "hindu", "india", "hi", "2024-05-23"),
    ];
    for (data_type, community, region, language, disc) in entries {
        let key = CacheKey::builder(data_type)
            .scope(community, region, Some(language))
            .segment(disc)
            .build();
        service.set(key.as_str(), &"payload", None).await.unwrap();
    }
    (service, store)
}

#[tokio::test]
async fn test_invalidate_community_and_region() {
    setup_logging();
    let (service, store) = seeded_service().await;

    let report = service
        .invalidate_by_context(&CulturalCacheContext::new("Buddhist", " sri_lanka "))
        .await
        .unwrap();

    assert_eq!(report.removed, 2);
    assert!(store
        .get("cal:hindu:india:hi:2024-05-23")
        .await
        .unwrap()
        .is_some());
    assert!(store
        .get("cal:buddhist:canada:en:2024-05-23")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_invalidate_narrowed_by_data_type() {
    setup_logging();
    let (service, store) = seeded_service().await;

    let ctx = CulturalCacheContext::new("buddhist", "sri_lanka").with_data_type("cultural_score");
    let report = service.invalidate_by_context(&ctx).await.unwrap();

    assert_eq!(report.pattern, "cultural_score:buddhist:sri_lanka:*:*");
    assert_eq!(report.removed, 1);
    assert!(store
        .get("cal:buddhist:sri_lanka:si:2024-05-23")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_invalidate_is_idempotent() {
    setup_logging();
    let (service, _) = seeded_service().await;
    let ctx = CulturalCacheContext::new("buddhist", "sri_lanka");

    assert_eq!(service.invalidate_by_context(&ctx).await.unwrap().removed, 2);
    assert_eq!(service.invalidate_by_context(&ctx).await.unwrap().removed, 0);
}

#[tokio::test]
async fn test_remove_pattern_removes_exact_matches() {
    setup_logging();
    let store = Arc::new(MemoryStore::new());
    let service = CacheService::with_store(memory_config(), store.clone());
    let ttl = Some(Duration::from_secs(60));

    service.set("report:a", &1u32, ttl).await.unwrap();
    service.set("report:b", &2u32, ttl).await.unwrap();
    service.set("summary:c", &3u32, ttl).await.unwrap();

    assert_eq!(service.remove_pattern("report:*").await.unwrap(), 2);
    assert_eq!(service.get::<u32>("summary:c").await.unwrap(), Some(3));
    assert_eq!(service.get::<u32>("report:a").await.unwrap(), None);
}

#[tokio::test]
async fn test_rejects_empty_inputs() {
    setup_logging();
    let (service, _) = seeded_service().await;

    assert!(matches!(
        service.remove_pattern("  ").await,
        Err(CacheError::InvalidArgument(_))
    ));
    assert!(matches!(
        service
            .invalidate_by_context(&CulturalCacheContext::new("", "india"))
            .await,
        Err(CacheError::InvalidArgument(_))
    ));
}
