//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 旁路缓存读取或计算的集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{memory_config, setup_logging};
use ctxcache::backend::{CacheStore, MemoryStore};
use ctxcache::{CacheError, CacheKey, CacheService, EndpointId, KeyedQuery};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CalendarDay {
    date: String,
    poya: bool,
    observances: Vec<String>,
}

fn vesak() -> CalendarDay {
    CalendarDay {
        date: "2024-05-23".to_string(),
        poya: true,
        observances: vec!["Vesak".to_string()],
    }
}

struct CalendarQuery {
    community: String,
    region: String,
    language: String,
    date: String,
}

impl KeyedQuery for CalendarQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::builder("cal")
            .scope(&self.community, &self.region, Some(self.language.as_str()))
            .segment(&self.date)
            .build()
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(60)
    }
}

fn service() -> (CacheService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (CacheService::with_store(memory_config(), store.clone()), store)
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    setup_logging();
    let (service, _) = service();
    let calls = AtomicUsize::new(0);
    let calls = &calls;

    let first: CalendarDay = service
        .get_or_set("cal:buddhist:sri_lanka:si:2024-05-23", None, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(vesak())
        })
        .await
        .unwrap();

    let second: CalendarDay = service
        .get_or_set("cal:buddhist:sri_lanka:si:2024-05-23", None, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(CalendarDay {
                date: "never".to_string(),
                poya: false,
                observances: vec![],
            })
        })
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let snap = service.snapshot(&EndpointId::from("cal"));
    assert_eq!(snap.hit_count, 1);
    assert_eq!(snap.miss_count, 1);
    assert!((snap.hit_ratio - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_miss_stores_serialized_result() {
    setup_logging();
    let (service, store) = service();

    let _: CalendarDay = service
        .get_or_set("cal:hindu:india:hi:2024-05-23", Some(Duration::from_secs(30)), || async {
            Ok::<_, CacheError>(vesak())
        })
        .await
        .unwrap();

    let raw = store
        .get("cal:hindu:india:hi:2024-05-23")
        .await
        .unwrap()
        .expect("value should be cached");
    let decoded: CalendarDay = serde_json::from_str(&raw).unwrap();
    assert_eq!(decoded, vesak());
}

#[tokio::test]
async fn test_get_or_compute_uses_query_key() {
    setup_logging();
    let (service, store) = service();
    let query = CalendarQuery {
        community: "Buddhist".to_string(),
        region: "Sri Lanka".to_string(),
        language: "si".to_string(),
        date: "2024-05-23".to_string(),
    };

    let day: CalendarDay = service
        .get_or_compute(&query, || async { Ok::<_, CacheError>(vesak()) })
        .await
        .unwrap();
    assert_eq!(day, vesak());
    assert!(store
        .get("cal:buddhist:sri%20lanka:si:2024-05-23")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_queries_differing_in_punctuation_do_not_share_entries() {
    setup_logging();
    let (service, _) = service();
    let query = |date: &str| CalendarQuery {
        community: "buddhist".to_string(),
        region: "sri_lanka".to_string(),
        language: "si".to_string(),
        date: date.to_string(),
    };

    let dates = ["a:b", "a b", "a*b", "a_b"];
    for date in dates {
        let stored: String = service
            .get_or_compute(&query(date), || async move {
                Ok::<_, CacheError>(format!("result for {date}"))
            })
            .await
            .unwrap();
        assert_eq!(stored, format!("result for {date}"));
    }

    for date in dates {
        let cached: String = service
            .get_or_compute(&query(date), || async {
                Ok::<_, CacheError>("recomputed".to_string())
            })
            .await
            .unwrap();
        assert_eq!(cached, format!("result for {date}"));
    }
}

#[tokio::test]
async fn test_get_set_remove() {
    setup_logging();
    let (service, _) = service();

    assert_eq!(service.get::<CalendarDay>("cal:x").await.unwrap(), None);
    service.set("cal:x", &vesak(), None).await.unwrap();
    assert_eq!(service.get::<CalendarDay>("cal:x").await.unwrap(), Some(vesak()));
    assert!(service.remove("cal:x").await.unwrap());
    assert!(!service.remove("cal:x").await.unwrap());
    assert_eq!(service.get::<CalendarDay>("cal:x").await.unwrap(), None);
}

#[tokio::test]
async fn test_get_with_wrong_type_is_absent() {
    setup_logging();
    let (service, _) = service();
    service.set("cal:y", &"text", None).await.unwrap();
    assert_eq!(service.get::<CalendarDay>("cal:y").await.unwrap(), None);
}

#[tokio::test]
async fn test_factory_error_with_anyhow() {
    setup_logging();
    let (service, store) = service();

    let result: anyhow::Result<u32> = service
        .get_or_set("cal:z", None, || async { Err(anyhow::anyhow!("database down")) })
        .await;
    assert_eq!(result.unwrap_err().to_string(), "database down");
    assert!(store.get("cal:z").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let (service, _) = service();
    service
        .set("cal:ttl", &1u32, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(service.get::<u32>("cal:ttl").await.unwrap(), None);
}

#[tokio::test]
async fn test_very_long_ttl_is_accepted() {
    setup_logging();
    let (service, store) = service();

    let value: u32 = service
        .get_or_set("cal:k", Some(Duration::from_secs(u64::MAX)), || async {
            Ok::<_, CacheError>(5)
        })
        .await
        .unwrap();
    assert_eq!(value, 5);
    assert_eq!(store.get("cal:k").await.unwrap().as_deref(), Some("5"));

    service
        .set("cal:m", &6u32, Some(Duration::MAX))
        .await
        .unwrap();
    assert_eq!(service.get::<u32>("cal:m").await.unwrap(), Some(6));
}
