//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 同键未命中合并的集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{memory_config, setup_logging, SlowStore};
use ctxcache::{CacheError, CacheService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

async fn run_concurrent_misses(single_flight: bool) -> usize {
    let mut config = memory_config();
    config.executor.single_flight = single_flight;
    let store = Arc::new(SlowStore::new(Duration::from_millis(10)));
    let service = Arc::new(CacheService::with_store(config, store));

    let computations = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(10));

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            let computations = computations.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                service
                    .get_or_set("event_recommendations:hot", None, || async move {
                        computations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, CacheError>(vec!["poson".to_string(), "vesak".to_string()])
                    })
                    .await
                    .unwrap()
            })
        })
        .collect();

    for task in tasks {
        let value = task.await.unwrap();
        assert_eq!(value, vec!["poson".to_string(), "vesak".to_string()]);
    }
    computations.load(Ordering::SeqCst)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_deduplication() {
    setup_logging();
    assert_eq!(run_concurrent_misses(true).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_without_single_flight_every_miss_computes() {
    setup_logging();
    // 默认不合并：所有调用方都在第一次写入前读到未命中
    assert_eq!(run_concurrent_misses(false).await, 10);
}
