use std::time::Duration;

use flightcache::{CacheError, ExpirationPolicy, Ttl};
use tokio::time;

use crate::{CallCounter, setup_cache};

const TTL: Ttl = Ttl::After(Duration::from_millis(100));

#[tokio::test(start_paused = true)]
async fn test_evict_on_expire_from_config() {
    let cache = setup_cache("cache:\n  return_expired: false\n");
    assert_eq!(cache.config().policy(), ExpirationPolicy::EvictOnExpire);

    let counter = CallCounter::new();
    let value = cache
        .get_or_compute("key".to_owned(), TTL, counter.returning("a".to_owned()))
        .await;
    assert_eq!(value.unwrap(), "a");

    time::sleep(Duration::from_millis(150)).await;
    let err = cache.get_cached("key".to_owned()).await.unwrap_err();
    assert!(matches!(err, CacheError::MissingProducer));

    let value = cache
        .get_or_compute("key".to_owned(), TTL, counter.returning("b".to_owned()))
        .await;
    assert_eq!(value.unwrap(), "b");
    assert_eq!(counter.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_while_revalidate_from_config() {
    let cache = setup_cache("cache:\n  return_expired: true\n");
    assert_eq!(cache.config().policy(), ExpirationPolicy::StaleWhileRevalidate);

    let counter = CallCounter::new();
    let value = cache
        .get_or_compute("key".to_owned(), TTL, counter.returning("a".to_owned()))
        .await;
    assert_eq!(value.unwrap(), "a");

    time::sleep(Duration::from_millis(150)).await;
    let lookup = cache.lookup(
        "key".to_owned(),
        TTL,
        Some(counter.delayed("b".to_owned(), Duration::from_millis(20))),
    );
    assert_eq!(lookup.value.await.unwrap(), "a");

    // stale reads keep being served while the refresh runs
    let stale = cache.get_cached("key".to_owned()).await;
    assert_eq!(stale.unwrap(), "a");

    let refreshed = lookup.refresh.unwrap().await;
    assert_eq!(refreshed.unwrap(), "b");
    assert_eq!(cache.get_cached("key".to_owned()).await.unwrap(), "b");
    assert_eq!(counter.calls(), 2);
}
