//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! Redis集成测试
//!
//! 需要可用的Redis实例（REDIS_URL），不可用时跳过

#[path = "../common/mod.rs"]
mod common;

use common::{is_redis_available, redis_url, setup_logging, unique_community};
use ctxcache::backend::{CacheStore, RedisStore};
use ctxcache::config::{Config, StoreMode};
use ctxcache::{CacheError, CacheService, CulturalCacheContext, HealthState};
use secrecy::SecretString;
use std::time::Duration;

fn redis_config() -> Config {
    let mut config = Config::default();
    config.store.mode = StoreMode::Standalone;
    config.store.connection_string = SecretString::new(redis_url().into());
    config.store.scan_count = 10;
    config
}

#[tokio::test]
async fn test_redis_store_basic_operations() {
    setup_logging();
    if !is_redis_available().await {
        println!("跳过测试: Redis不可用");
        return;
    }

    let store = RedisStore::new(&redis_config().store).await.unwrap();
    let prefix = unique_community("basic");
    let key = format!("test:{prefix}:a");

    store.set(&key, "value", Duration::from_secs(30)).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("value"));

    assert!(store.delete(&key).await.unwrap());
    assert!(!store.delete(&key).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap(), None);

    let info = store.memory_info().await.unwrap();
    assert!(info.contains("used_memory:"));
}

#[tokio::test]
async fn test_redis_scan_and_delete_many() {
    setup_logging();
    if !is_redis_available().await {
        println!("跳过测试: Redis不可用");
        return;
    }

    let store = RedisStore::new(&redis_config().store).await.unwrap();
    let prefix = unique_community("scan");
    for i in 0..25 {
        store
            .set(&format!("test:{prefix}:{i}"), "v", Duration::from_secs(30))
            .await
            .unwrap();
    }

    let keys = store.scan(&format!("test:{prefix}:*")).await.unwrap();
    assert_eq!(keys.len(), 25);
    assert_eq!(store.delete_many(&keys).await.unwrap(), 25);
    assert!(store.scan(&format!("test:{prefix}:*")).await.unwrap().is_empty());
    assert_eq!(store.delete_many(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_service_against_redis() {
    setup_logging();
    if !is_redis_available().await {
        println!("跳过测试: Redis不可用");
        return;
    }

    let service = CacheService::connect(redis_config()).await.unwrap();
    let community = unique_community("buddhist");
    let key = format!("cal:{community}:sri_lanka:si:2024-05-23");
    let other = format!("cal:{community}:india:hi:2024-05-23");

    let value: String = service
        .get_or_set(&key, Some(Duration::from_secs(60)), || async {
            Ok::<_, CacheError>("vesak".to_string())
        })
        .await
        .unwrap();
    assert_eq!(value, "vesak");
    service
        .set(&other, &"diwali", Some(Duration::from_secs(60)))
        .await
        .unwrap();

    let context = CulturalCacheContext::new(&community, "sri_lanka");
    let report = service.invalidate_by_context(&context).await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(service.get::<String>(&key).await.unwrap(), None);
    assert_eq!(
        service.get::<String>(&other).await.unwrap().as_deref(),
        Some("diwali")
    );

    let removed = service
        .remove_pattern(&format!("cal:{community}:*"))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let status = service.check_health().await;
    assert_ne!(status.status, HealthState::Unhealthy);
    assert_eq!(status.detail_flag("redis_connectivity"), Some(true));
}

#[tokio::test]
async fn test_unreachable_redis_fails_to_connect() {
    setup_logging();
    let mut config = redis_config();
    config.store.connection_string = SecretString::new("redis://127.0.0.1:1".into());
    config.store.connection_timeout_ms = 300;

    let result = CacheService::connect(config).await;
    assert!(result.is_err());
}
