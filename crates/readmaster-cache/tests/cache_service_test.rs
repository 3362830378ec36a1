//! Behaviour of the core and advanced operations against an in-process store.

mod common;

use common::{degraded_cache, CallCounter, TestCache};
use readmaster_cache::{CacheStore, CacheTtl, Expiry, GetOptions, SetOptions, TtlStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Progress {
    chapter: u32,
    percent: f64,
    highlights: Vec<String>,
}

fn sample_progress() -> Progress {
    Progress {
        chapter: 4,
        percent: 37.5,
        highlights: vec!["p12".to_string(), "p40".to_string()],
    }
}

#[tokio::test]
async fn test_set_then_get_round_trips_structured_values() {
    let cache = TestCache::new().service;

    assert!(cache.set("progress:u1:b1", &sample_progress(), SetOptions::default()).await);
    assert_eq!(cache.get::<Progress>("progress:u1:b1").await, Some(sample_progress()));

    let doc = json!({ "title": "Dune", "tags": ["sf", "classic"], "rating": null });
    assert!(cache.set("book:b1", &doc, SetOptions::ttl(CacheTtl::Long)).await);
    assert_eq!(cache.get::<serde_json::Value>("book:b1").await, Some(doc));
}

#[tokio::test]
async fn test_set_without_ttl_never_expires() {
    let cache = TestCache::new().service;

    cache.set("session:s1", "token", SetOptions::default()).await;
    assert_eq!(cache.ttl("session:s1").await, TtlStatus::Persistent);
    assert_eq!(cache.ttl("session:s1").await.as_raw(), -1);
}

#[tokio::test]
async fn test_ttl_reports_remaining_and_missing() {
    let cache = TestCache::new().service;

    cache.set("guide:b1", "g", SetOptions::ttl(CacheTtl::Short)).await;
    match cache.ttl("guide:b1").await {
        TtlStatus::Expiring(remaining) => {
            assert!(remaining <= CacheTtl::Short.duration());
            assert!(remaining >= Duration::from_secs(298));
        }
        other => panic!("expected an expiring key, got {:?}", other),
    }
    assert_eq!(cache.ttl("guide:nope").await.as_raw(), -2);
}

#[tokio::test]
async fn test_nx_only_writes_once() {
    let cache = TestCache::new().service;

    assert!(cache.set("user:u1", "first", SetOptions::default().if_absent()).await);
    assert!(!cache.set("user:u1", "second", SetOptions::default().if_absent()).await);
    assert_eq!(cache.get::<String>("user:u1").await.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_xx_only_overwrites_existing() {
    let cache = TestCache::new().service;

    assert!(!cache.set("user:u2", "ghost", SetOptions::default().if_present()).await);
    assert!(!cache.exists("user:u2").await);

    cache.set("user:u2", "old", SetOptions::default()).await;
    assert!(cache.set("user:u2", "new", SetOptions::default().if_present()).await);
    assert_eq!(cache.get::<String>("user:u2").await.as_deref(), Some("new"));
}

#[tokio::test]
async fn test_del_exists_and_expire() {
    let cache = TestCache::new().service;

    cache.set("forum:t1", &1, SetOptions::default()).await;
    assert!(cache.exists("forum:t1").await);
    assert!(cache.expire("forum:t1", CacheTtl::Day).await);
    assert!(!cache.expire("forum:missing", CacheTtl::Day).await);

    assert!(cache.del("forum:t1").await);
    assert!(!cache.del("forum:t1").await);
    assert!(!cache.exists("forum:t1").await);
}

#[tokio::test]
async fn test_expire_zero_removes_key() {
    let cache = TestCache::new().service;

    cache.set("forum:t2", &1, SetOptions::ttl(CacheTtl::Day)).await;
    assert!(cache.expire("forum:t2", Duration::ZERO).await);
    assert!(!cache.exists("forum:t2").await);
    assert_eq!(cache.ttl("forum:t2").await, TtlStatus::Missing);
}

#[tokio::test]
async fn test_del_many_counts_existing_keys() {
    let cache = TestCache::new().service;

    for key in ["a", "b", "c"] {
        cache.set(key, key, SetOptions::default()).await;
    }
    let keys = vec!["a".to_string(), "c".to_string(), "zzz".to_string()];
    assert_eq!(cache.del_many(&keys).await, 2);
    assert!(cache.exists("b").await);
}

#[tokio::test]
async fn test_get_refreshes_ttl_on_hit() {
    let cache = TestCache::new().service;

    cache.set("api:books", "[]", SetOptions::ttl(CacheTtl::VeryShort)).await;
    let hit: Option<String> = cache
        .get_with("api:books", GetOptions::refresh_ttl(CacheTtl::Week))
        .await;
    assert!(hit.is_some());

    match cache.ttl("api:books").await {
        TtlStatus::Expiring(remaining) => assert!(remaining > CacheTtl::Day.duration()),
        other => panic!("expected an expiring key, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_value_reads_as_miss() {
    let cache = TestCache::new();

    cache
        .store
        .set("book:b9", "not json", SetOptions::default())
        .await
        .unwrap();
    assert_eq!(cache.service.get::<Progress>("book:b9").await, None);

    cache.service.set("book:b9", "a string", SetOptions::default()).await;
    assert_eq!(cache.service.get::<Progress>("book:b9").await, None);
}

#[tokio::test]
async fn test_get_or_set_returns_cached_value_after_population() {
    let cache = TestCache::new().service;

    let first: Result<Progress, ()> = cache
        .get_or_set("progress:u1:b2", CacheTtl::Medium, || async { Ok(sample_progress()) })
        .await;
    assert_eq!(first, Ok(sample_progress()));

    cache.settle().await;

    let other = Progress {
        chapter: 99,
        percent: 0.0,
        highlights: vec![],
    };
    let second: Result<Progress, ()> = cache
        .get_or_set("progress:u1:b2", CacheTtl::Medium, || async move { Ok(other) })
        .await;
    assert_eq!(second, Ok(sample_progress()));
    assert!(matches!(cache.ttl("progress:u1:b2").await, TtlStatus::Expiring(_)));
}

#[tokio::test]
async fn test_get_or_set_hit_never_calls_fetcher() {
    let cache = TestCache::new().service;
    let calls = CallCounter::default();

    cache.set("leaderboard:xp:weekly:1", &vec![1, 2, 3], SetOptions::default()).await;

    let counter = calls.clone();
    let value: Result<Vec<u32>, ()> = cache
        .get_or_set("leaderboard:xp:weekly:1", CacheTtl::Short, || async move {
            counter.hit();
            Ok(vec![])
        })
        .await;
    assert_eq!(value, Ok(vec![1, 2, 3]));
    assert_eq!(calls.count(), 0);
}

#[tokio::test]
async fn test_mget_preserves_order_and_length() {
    let cache = TestCache::new().service;

    cache.set("k1", &1, SetOptions::default()).await;
    cache.set("k3", &3, SetOptions::default()).await;

    let keys: Vec<String> = ["k1", "k2", "k3"].iter().map(ToString::to_string).collect();
    assert_eq!(cache.mget::<u32>(&keys).await, vec![Some(1), None, Some(3)]);
}

#[tokio::test]
async fn test_mset_applies_ttl_to_every_key() {
    let cache = TestCache::new().service;

    let entries = vec![
        ("flashcard:u1:1".to_string(), "front"),
        ("flashcard:u1:2".to_string(), "back"),
    ];
    assert!(cache.mset(&entries, CacheTtl::Long).await);

    for (key, value) in &entries {
        assert_eq!(cache.get::<String>(key).await.as_deref(), Some(*value));
        assert!(matches!(cache.ttl(key).await, TtlStatus::Expiring(_)));
    }

    assert!(cache.mset(&[("flashcard:u1:3".to_string(), "x")], Expiry::Never).await);
    assert_eq!(cache.ttl("flashcard:u1:3").await, TtlStatus::Persistent);
}

#[tokio::test]
async fn test_counters() {
    let cache = TestCache::new().service;

    assert_eq!(cache.incr("analytics:views").await, Some(1));
    assert_eq!(cache.incr_by("analytics:views", 10).await, Some(11));
    assert_eq!(cache.decr("analytics:views").await, Some(10));
    assert_eq!(cache.decr_by("analytics:views", 4).await, Some(6));

    cache.set("analytics:label", "not a number", SetOptions::default()).await;
    assert_eq!(cache.incr("analytics:label").await, None);
}

#[tokio::test]
async fn test_degraded_mode_returns_defaults() {
    let cache = degraded_cache();
    assert!(!cache.is_available());
    assert!(!cache.ping().await);

    assert_eq!(cache.get::<String>("k").await, None);
    assert!(!cache.set("k", "v", SetOptions::default()).await);
    assert!(!cache.del("k").await);
    assert_eq!(cache.del_many(&["a".to_string(), "b".to_string()]).await, 0);
    assert!(!cache.exists("k").await);
    assert!(!cache.expire("k", CacheTtl::Short).await);
    assert_eq!(cache.ttl("k").await.as_raw(), -2);

    let keys: Vec<String> = (0..4).map(|i| format!("k{}", i)).collect();
    assert_eq!(cache.mget::<String>(&keys).await, vec![None, None, None, None]);
    assert!(!cache.mset(&[("k".to_string(), 1)], CacheTtl::Short).await);
    assert_eq!(cache.incr("k").await, None);
    assert_eq!(cache.decr_by("k", 3).await, None);

    let calls = CallCounter::default();
    for _ in 0..2 {
        let counter = calls.clone();
        let value: Result<u32, ()> = cache
            .get_or_set("k", CacheTtl::Short, || async move {
                counter.hit();
                Ok(5)
            })
            .await;
        assert_eq!(value, Ok(5));
    }
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_ping_reaches_store() {
    let cache = TestCache::new().service;
    assert!(cache.is_available());
    assert!(cache.ping().await);
}
