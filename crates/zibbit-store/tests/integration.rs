//! Integration tests for the `Dragonfly` store.
//!
//! These tests require a live Dragonfly (or Redis) instance. Run with:
//!
//! ```bash
//! docker run -d -p 6379:6379 docker.dragonflydb.io/dragonflydb/dragonfly
//! cargo test -p zibbit-store -- --ignored
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use zibbit_store::{DragonflyPool, GameStore, KeyTtl};

/// Dragonfly connection URL for the local Docker instance.
const DRAGONFLY_URL: &str = "redis://localhost:6379";

async fn connect() -> DragonflyPool {
    DragonflyPool::connect(DRAGONFLY_URL, "zibbit_test:*")
        .await
        .expect("Failed to connect to Dragonfly -- is Docker running?")
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn dragonfly_set_if_absent_and_ttl() {
    let pool = connect().await;
    let key = "zibbit_test:cooldown:the cat";
    let _ = pool.delete(key).await.unwrap();

    assert!(
        pool.set_if_absent(key, "1", Duration::from_secs(5))
            .await
            .unwrap()
    );
    assert!(
        !pool
            .set_if_absent(key, "2", Duration::from_secs(5))
            .await
            .unwrap()
    );
    match pool.ttl(key).await.unwrap() {
        KeyTtl::Expires(d) => assert!(d <= Duration::from_secs(5)),
        other => panic!("unexpected ttl {other:?}"),
    }

    assert!(pool.delete(key).await.unwrap());
    assert_eq!(pool.ttl(key).await.unwrap(), KeyTtl::Missing);
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn dragonfly_delete_claims_once_under_contention() {
    let pool = Arc::new(connect().await);
    let key = "zibbit_test:candidate:1";
    pool.set(key, "{}", Some(Duration::from_secs(10)))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move { pool.delete(key).await.unwrap() }));
    }
    let mut winners = 0_u32;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn dragonfly_lists_sets_and_counters() {
    let pool = connect().await;
    let list = "zibbit_test:story:words";
    let set = "zibbit_test:word:1:flaggers";
    let counter = "zibbit_test:ids:word";
    for key in [list, set, counter] {
        let _ = pool.delete(key).await.unwrap();
    }

    let ids: Vec<String> = (1..=3).map(|i: u32| i.to_string()).collect();
    pool.list_push(list, &ids).await.unwrap();
    assert_eq!(pool.list_remove(list, "2").await.unwrap(), 1);
    assert_eq!(pool.list_range(list).await.unwrap(), vec!["1", "3"]);

    assert!(pool.set_add(set, "a").await.unwrap());
    assert!(!pool.set_add(set, "a").await.unwrap());
    assert_eq!(pool.set_members(set).await.unwrap(), vec!["a"]);
    assert!(pool.set_remove(set, "a").await.unwrap());

    assert_eq!(pool.increment_by(counter, 3).await.unwrap(), 3);
    assert_eq!(pool.increment_by(counter, 1).await.unwrap(), 4);

    for key in [list, set, counter] {
        let _ = pool.delete(key).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires live Dragonfly instance"]
async fn dragonfly_pattern_subscription_delivers_messages() {
    let pool = connect().await;
    let mut rx = pool.subscribe();

    pool.publish("zibbit_test:story_update", "{\"story\":[]}")
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no message within 2s")
        .unwrap();
    assert_eq!(msg.topic, "zibbit_test:story_update");
    assert_eq!(msg.payload, "{\"story\":[]}");
}
