//! Cross-process backend tests against a live redis
//!
//! Ignored by default. Run with:
//! `TIC_REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_tests -- --ignored`

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use tic_broadcast::channels::Member;
use tic_broadcast::{
    Event, GroupRegistry, InMemoryRegistry, RedisChannelLayer, RedisStore, SharedStore,
};

fn redis_url() -> String {
    std::env::var("TIC_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Unique per run so parallel test runs do not see each other's traffic
fn unique(name: &str) -> String {
    format!("{}-{}", name, uuid::Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires a running redis (TIC_REDIS_URL)"]
async fn test_broadcast_crosses_processes_in_order() {
    let url = redis_url();
    let receiving = RedisChannelLayer::connect(&url, InMemoryRegistry::new())
        .await
        .unwrap();
    let sending = RedisChannelLayer::connect(&url, InMemoryRegistry::new())
        .await
        .unwrap();

    let group = unique("time");
    let (tx, mut rx) = mpsc::channel(16);
    receiving.join(&group, Member::new("conn1", tx)).await.unwrap();
    assert_eq!(receiving.member_count(&group), 1);
    assert_eq!(sending.member_count(&group), 0);

    // Wait until both subscribers are attached
    let warmup = unique("warmup");
    timeout(Duration::from_secs(5), async {
        while sending.broadcast(&warmup, Event::tic("warmup")).await.unwrap() < 2 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("subscribers never attached");

    for i in 0..5 {
        sending
            .broadcast(&group, Event::tic(format!("10:00:0{}", i)))
            .await
            .unwrap();
    }

    for i in 0..5 {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event not delivered")
            .unwrap();
        assert_eq!(event, Event::tic(format!("10:00:0{}", i)));
    }

    // Leaving stops delivery on the receiving side
    receiving.leave(&group, "conn1").await.unwrap();
    sending.broadcast(&group, Event::tic("10:00:09")).await.unwrap();
    assert!(timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .is_none());

    receiving.shutdown();
    sending.shutdown();
}

#[tokio::test]
#[ignore = "requires a running redis (TIC_REDIS_URL)"]
async fn test_redis_store_last_write_wins() {
    let store = RedisStore::connect(&redis_url()).await.unwrap();
    let key = unique("tic:test:time");

    assert_eq!(store.get(&key).await.unwrap(), None);

    store.set(&key, "10:00:00").await.unwrap();
    store.set(&key, "10:00:01").await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("10:00:01"));

    // A second handle sees the same value
    let other = RedisStore::connect(&redis_url()).await.unwrap();
    assert_eq!(other.get(&key).await.unwrap().as_deref(), Some("10:00:01"));
}
