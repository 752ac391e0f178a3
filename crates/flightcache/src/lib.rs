//! A single-flight TTL cache for asynchronously produced values.
//!
//! Callers request a value by key, optionally supplying an asynchronous producer. Concurrent
//! requests for the same key share one pending production, and a produced value is kept until
//! its time-to-live elapses. Expired values are either evicted or served stale while a refresh
//! runs in the background, see [`CacheConfig::return_expired`].
//!
//! ```
//! use std::time::Duration;
//!
//! use flightcache::{CacheConfig, CoalescingCache, Ttl};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache: CoalescingCache<&str, u32> = CoalescingCache::new(CacheConfig::default());
//! let ttl = Ttl::After(Duration::from_secs(60));
//!
//! let value = cache.get_or_compute("answer", ttl, || async { anyhow::Ok(42) });
//! assert_eq!(value.await.unwrap(), 42);
//!
//! // served from the cache, without producer
//! assert_eq!(cache.get_cached("answer").await.unwrap(), 42);
//! # }
//! ```

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod logging;

pub use caching::{
    CacheEntry, CacheError, CoalescingCache, Computation, ExpirationPolicy, Lookup, Producer, Ttl,
};
pub use config::CacheConfig;
