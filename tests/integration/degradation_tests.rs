//! 后端故障降级测试
//!
//! 覆盖读取或计算在后端完全不可用时的行为，以及写入、失效和健康检查对故障的处理。

#[path = "../common/mod.rs"]
mod common;

use common::{memory_config, setup_logging, FaultyStore, HangingStore};
use ctxcache::{
    CacheError, CacheService, CulturalCacheContext, EndpointId, HealthState, StoreFault,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_get_or_set_survives_total_outage() {
    setup_logging();
    let store = Arc::new(FaultyStore::new(StoreFault::Connection(
        "connection refused".to_string(),
    )));
    let service = CacheService::with_store(memory_config(), store.clone());

    let value: String = service
        .get_or_set("cultural_score:k", None, || async {
            Ok::<_, CacheError>("computed".to_string())
        })
        .await
        .unwrap();

    assert_eq!(value, "computed");
    // 读取失败后跳过回写
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);

    let snap = service.snapshot(&EndpointId::from("cultural_score"));
    assert_eq!(snap.miss_count, 1);
    assert_eq!(snap.fault_count, 1);
}

#[tokio::test]
async fn test_get_or_set_is_bounded_when_store_hangs() {
    setup_logging();
    let service = CacheService::with_store(memory_config(), Arc::new(HangingStore));

    let started = Instant::now();
    let value: u32 = tokio::time::timeout(
        Duration::from_secs(5),
        service.get_or_set("cal:k", None, || async { Ok::<_, CacheError>(42) }),
    )
    .await
    .expect("get_or_set must not hang")
    .unwrap();

    assert_eq!(value, 42);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_get_returns_absent_on_fault() {
    setup_logging();
    let service = CacheService::with_store(
        memory_config(),
        Arc::new(FaultyStore::new(StoreFault::Timeout(200))),
    );
    assert_eq!(service.get::<u32>("cal:k").await.unwrap(), None);
}

#[tokio::test]
async fn test_writes_surface_faults() {
    setup_logging();
    let service = CacheService::with_store(
        memory_config(),
        Arc::new(FaultyStore::new(StoreFault::Connection("down".to_string()))),
    );

    assert!(matches!(
        service.set("cal:k", &1u32, None).await,
        Err(CacheError::Store(StoreFault::Connection(_)))
    ));
    assert!(matches!(
        service.remove("cal:k").await,
        Err(CacheError::Store(StoreFault::Connection(_)))
    ));
}

#[tokio::test]
async fn test_hanging_writes_time_out() {
    setup_logging();
    let service = CacheService::with_store(memory_config(), Arc::new(HangingStore));
    assert!(matches!(
        service.set("cal:k", &1u32, None).await,
        Err(CacheError::Store(StoreFault::Timeout(200)))
    ));
}

#[tokio::test]
async fn test_invalidation_is_never_silently_downgraded() {
    setup_logging();
    let service = CacheService::with_store(
        memory_config(),
        Arc::new(FaultyStore::new(StoreFault::Timeout(200))),
    );

    let err = service
        .invalidate_by_context(&CulturalCacheContext::new("buddhist", "sri_lanka"))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Invalidation { .. }));
    assert!(err.to_string().contains("*:buddhist:sri_lanka:*:*"));
}

#[tokio::test]
async fn test_health_reports_unreachable_store() {
    setup_logging();
    let service = CacheService::with_store(memory_config(), Arc::new(HangingStore));

    let status = service.check_health().await;
    assert!(!status.is_healthy);
    assert_eq!(status.status, HealthState::Unhealthy);
    assert_eq!(status.detail_flag("redis_connectivity"), Some(false));
    assert_eq!(status.details["failed_check"], "write");
}

#[tokio::test]
async fn test_transient_faults_are_retried_when_configured() {
    setup_logging();
    let mut config = memory_config();
    config.store.max_retries = 2;
    config.store.retry_base_delay_ms = 1;

    let store = Arc::new(FaultyStore::new(StoreFault::Connection("reset".to_string())));
    let service = CacheService::with_store(config, store.clone());

    let _ = service.get::<u32>("cal:k").await;
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
}
