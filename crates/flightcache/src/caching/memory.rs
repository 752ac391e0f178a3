use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::config::CacheConfig;

use super::cache_error::{CacheEntry, CacheError};
use super::computation::{Computation, Lookup, Producer};
use super::expiration::{Expiration, ExpirationPolicy, Ttl};
use super::record::CacheRecord;

/// The producer type of lookups that do not supply one.
type NoProducer<T> = fn() -> futures::future::Ready<anyhow::Result<T>>;

/// An in-memory, single-flight TTL cache for asynchronously produced values.
///
/// Values are identified by keys of type `K`, which need well-defined [`Eq`] and [`Hash`]
/// semantics. Concurrent lookups of the same key share one [`Computation`] rather than invoking
/// their producers again. Once a production settles successfully, its value is kept for the
/// [`Ttl`] the lookup asked for; what happens afterwards depends on the configured
/// [`ExpirationPolicy`].
///
/// Cloning the cache is cheap, all clones share the same records. The records are discarded
/// together with the last clone; background productions and TTL timers do not keep the cache
/// alive.
///
/// Productions and TTL timers are spawned onto the ambient tokio runtime, so lookups that may
/// start them must happen within a runtime context.
pub struct CoalescingCache<K, T> {
    pub(super) inner: Arc<Inner<K, T>>,
}

pub(super) struct Inner<K, T> {
    config: CacheConfig,
    records: Mutex<HashMap<K, CacheRecord<T>>>,
    next_record: AtomicU64,
}

impl<K, T> fmt::Debug for CoalescingCache<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CoalescingCache");
        s.field("config", &self.inner.config);
        match self.inner.records.try_lock() {
            Ok(records) => {
                let refreshes = records.values().filter(|r| r.is_refreshing()).count();
                s.field("in-memory items", &records.len())
                    .field("running refreshes", &refreshes);
            }
            Err(_) => {
                s.field("in-memory items", &format_args!("<locked>"))
                    .field("running refreshes", &format_args!("<locked>"));
            }
        }
        s.finish()
    }
}

impl<K, T> Clone for CoalescingCache<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> Default for CoalescingCache<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<K, T> CoalescingCache<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new, empty cache.
    pub fn new(config: CacheConfig) -> Self {
        let inner = Inner {
            config,
            records: Mutex::new(HashMap::new()),
            next_record: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The configuration this cache was created with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// The number of keys that currently have a record, pending or settled.
    pub fn entry_count(&self) -> usize {
        self.inner.records().len()
    }

    /// Returns `true` if no key currently has a record.
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Gets the value for `key`, producing it if needed.
    ///
    /// - Without a record for `key`, the `producer` is invoked once and the returned computation
    ///   resolves with its result. Without a `producer`, the computation fails with
    ///   [`CacheError::MissingProducer`].
    /// - A record that is not expired is served as-is, pending or settled.
    /// - An expired record is served with its stale value. If a `producer` is supplied and no
    ///   refresh is running, a refresh is started in the background; it only benefits later
    ///   lookups. Use [`lookup`](Self::lookup) to observe the refresh itself.
    ///
    /// This never blocks on the producer and returns without awaiting anything.
    ///
    /// # Panics
    ///
    /// Panics if a production has to be started outside of a tokio runtime.
    pub fn get<P>(&self, key: K, ttl: Ttl, producer: Option<P>) -> Computation<T>
    where
        P: Producer<T>,
    {
        self.lookup(key, ttl, producer).value
    }

    /// Gets the value for `key` if there is a record for it, without ever producing one.
    pub fn get_cached(&self, key: K) -> Computation<T> {
        self.get(key, Ttl::Never, None::<NoProducer<T>>)
    }

    /// Gets the value for `key`, invoking `producer` if there is no record or a refresh is due.
    ///
    /// See [`get`](Self::get).
    pub fn get_or_compute<P>(&self, key: K, ttl: Ttl, producer: P) -> Computation<T>
    where
        P: Producer<T>,
    {
        self.get(key, ttl, Some(producer))
    }

    /// Looks up `key` like [`get`](Self::get), additionally returning the refresh this lookup
    /// started, if any.
    ///
    /// # Panics
    ///
    /// Panics if a production has to be started outside of a tokio runtime.
    pub fn lookup<P>(&self, key: K, ttl: Ttl, producer: Option<P>) -> Lookup<T>
    where
        P: Producer<T>,
    {
        let policy = self.inner.config.policy().as_str();
        metric!(counter("caches.access") += 1, "policy" => policy);

        let mut records = self.inner.records();
        match records.entry(key) {
            Entry::Vacant(vacant) => {
                let Some(producer) = producer else {
                    tracing::trace!("Cache miss without a producer");
                    return Lookup {
                        value: Computation::failed(CacheError::MissingProducer),
                        refresh: None,
                    };
                };

                let id = self.inner.next_record.fetch_add(1, Ordering::Relaxed);
                let key = vacant.key().clone();
                let value = self.inner.spawn_production(key, id, ttl, false, producer);
                vacant.insert(CacheRecord::new(id, value.clone()));
                metric!(gauge("caches.records") = records.len() as u64);

                Lookup {
                    value,
                    refresh: None,
                }
            }
            Entry::Occupied(mut occupied) => {
                metric!(counter("caches.memory.hit") += 1, "policy" => policy);

                let record = occupied.get();
                let needs_refresh = record.expired && !record.is_refreshing();
                let refresh = match producer {
                    Some(producer) if needs_refresh => {
                        let key = occupied.key().clone();
                        let record = occupied.get_mut();
                        tracing::trace!(
                            generation = record.generation,
                            "Refreshing expired cache record"
                        );
                        let refresh = self
                            .inner
                            .spawn_production(key, record.id, ttl, true, producer);
                        record.next_value = Some(refresh.clone());
                        Some(refresh)
                    }
                    _ => None,
                };

                Lookup {
                    value: occupied.get().value.clone(),
                    refresh,
                }
            }
        }
    }
}

impl<K, T> Inner<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(super) fn records(&self) -> MutexGuard<'_, HashMap<K, CacheRecord<T>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns a production for the record `id` of `key`.
    ///
    /// The producer runs in its own task, so it is neither invoked on the caller's path nor while
    /// the records are locked. The `is_refresh` flag is used to tag metrics and logs.
    fn spawn_production<P>(
        self: &Arc<Self>,
        key: K,
        id: u64,
        ttl: Ttl,
        is_refresh: bool,
        producer: P,
    ) -> Computation<T>
    where
        P: Producer<T>,
    {
        metric!(
            counter("caches.computation") += 1,
            "is_refresh" => &is_refresh.to_string(),
        );
        if is_refresh {
            metric!(counter("caches.refresh") += 1);
        }

        let key_on_abort = key.clone();
        let cache = Arc::downgrade(self);
        let task = async move {
            // invoke the producer within `catch_unwind`, it might panic before its future exists
            let production = AssertUnwindSafe(async move { producer.produce().await });
            let result = match production.catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(CacheError::from_producer(err)),
                Err(_) => {
                    tracing::error!(is_refresh, "Cache producer panicked");
                    Err(CacheError::Aborted)
                }
            };

            if let Some(inner) = cache.upgrade() {
                inner.settle(&key, id, ttl, is_refresh, &result);
            }
            result
        };

        let handle = tokio::spawn(task);
        let cache = Arc::downgrade(self);
        Computation::new(async move {
            match handle.await {
                Ok(result) => result,
                // the task was cancelled before it could settle its record
                Err(err) => {
                    let result = Err(CacheError::from(err));
                    if let Some(inner) = cache.upgrade() {
                        inner.settle(&key_on_abort, id, ttl, is_refresh, &result);
                    }
                    result
                }
            }
        })
    }

    /// Applies the outcome of a production to its record.
    fn settle(
        self: &Arc<Self>,
        key: &K,
        id: u64,
        ttl: Ttl,
        is_refresh: bool,
        result: &CacheEntry<T>,
    ) {
        let mut records = self.records();
        let Some(record) = records.get_mut(key).filter(|record| record.id == id) else {
            tracing::trace!(is_refresh, "Cache record is gone, discarding production");
            return;
        };

        match result {
            Ok(_) => {
                if let Some(next_value) = record.next_value.take() {
                    record.value = next_value;
                }
                record.expired = false;
                record.generation += 1;

                let timer = self.schedule_expiration(key.clone(), record.expiration(), ttl);
                record.set_timer(timer);
            }
            Err(err) => {
                metric!(
                    counter("caches.computation.failed") += 1,
                    "is_refresh" => &is_refresh.to_string(),
                );
                tracing::debug!(
                    error = err as &dyn std::error::Error,
                    is_refresh,
                    "Cache production failed, removing record"
                );
                records.remove(key);
                metric!(gauge("caches.records") = records.len() as u64);
            }
        }
    }

    /// Arms the TTL timer for the given generation of a record.
    ///
    /// Returns `None` if the value never expires.
    fn schedule_expiration(
        self: &Arc<Self>,
        key: K,
        expiration: Expiration,
        ttl: Ttl,
    ) -> Option<AbortHandle> {
        // durations too large to be represented never elapse
        let deadline = Instant::now().checked_add(ttl.as_duration()?)?;
        let cache: Weak<Self> = Arc::downgrade(self);

        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = cache.upgrade() {
                inner.expire(&key, expiration);
            }
        });
        Some(timer.abort_handle())
    }

    /// Handles the TTL timer of a record according to the configured policy.
    pub(super) fn expire(&self, key: &K, expiration: Expiration) {
        let mut records = self.records();
        let Some(record) = records
            .get_mut(key)
            .filter(|record| record.expiration() == expiration)
        else {
            tracing::trace!(
                generation = expiration.generation,
                "Ignoring expiration of a superseded cache generation"
            );
            return;
        };

        // this timer is the one firing right now
        record.timer = None;

        match self.config.policy() {
            ExpirationPolicy::StaleWhileRevalidate => {
                metric!(counter("caches.expired") += 1);
                tracing::trace!(generation = record.generation, "Cache record expired");
                record.expired = true;
            }
            ExpirationPolicy::EvictOnExpire => {
                metric!(counter("caches.evicted") += 1);
                tracing::trace!(generation = record.generation, "Cache record evicted");
                records.remove(key);
                metric!(gauge("caches.records") = records.len() as u64);
            }
        }
    }
}
