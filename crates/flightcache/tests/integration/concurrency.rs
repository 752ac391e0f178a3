use std::time::Duration;

use flightcache::{CoalescingCache, Ttl};

use crate::{CallCounter, setup_cache};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_single_flight() {
    let cache = setup_cache("cache:\n  return_expired: true\n");
    let counter = CallCounter::new();
    let ttl = Ttl::After(Duration::from_secs(60));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let cache = cache.clone();
            let producer = counter.delayed(format!("value-{i}"), Duration::from_millis(50));
            tokio::spawn(async move {
                cache
                    .get_or_compute("key".to_owned(), ttl, producer)
                    .await
            })
        })
        .collect();

    let values = futures::future::try_join_all(tasks).await.unwrap();
    let first = values[0].as_ref().unwrap();
    for value in &values {
        assert_eq!(value.as_ref().unwrap(), first);
    }

    assert_eq!(counter.calls(), 1);
    assert_eq!(cache.entry_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_keys() {
    let cache: CoalescingCache<String, String> = setup_cache("{}\n");
    let counter = CallCounter::new();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let cache = cache.clone();
            let producer = counter.delayed(format!("value-{i}"), Duration::from_millis(10));
            tokio::spawn(async move {
                cache
                    .get_or_compute(format!("key-{i}"), Ttl::Never, producer)
                    .await
            })
        })
        .collect();

    let values = futures::future::try_join_all(tasks).await.unwrap();
    for (i, value) in values.into_iter().enumerate() {
        assert_eq!(value.unwrap(), format!("value-{i}"));
    }

    assert_eq!(counter.calls(), 16);
    assert_eq!(cache.entry_count(), 16);
}
