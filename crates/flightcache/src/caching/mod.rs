//! # Caching infrastructure
//!
//! The [`CoalescingCache`] keeps asynchronously produced values in memory, keyed by any type
//! with well-defined equality and hashing. It does request coalescing: concurrent lookups of the
//! same key share a single production rather than each invoking their producer.
//!
//! ## Record Lifecycle
//!
//! Every key with a record goes through the following states:
//!
//! - **pending**: The first lookup with a producer created the record. All lookups share the
//!   pending [`Computation`] until it settles.
//! - **fresh**: The production settled successfully, and a TTL timer was armed for this
//!   *generation* of the record.
//! - **expired**: The TTL timer fired. Under [`ExpirationPolicy::StaleWhileRevalidate`] the
//!   record stays around and keeps serving its last value. Under
//!   [`ExpirationPolicy::EvictOnExpire`] the record is deleted instead, and the next lookup is a
//!   cold miss.
//! - **regenerating**: A lookup with a producer found the record expired and started a refresh
//!   in the background. Lookups keep being served the stale value, and no second refresh is
//!   started, until the refresh settles. On success it replaces the stale value and the record
//!   is fresh again.
//!
//! Any failed production, be it the first one or a refresh, deletes the whole record. The
//! failure is delivered to the listeners of that production only; lookups that were served a
//! stale value in the meantime are unaffected.
//!
//! ## TTL Timers
//!
//! Expiration is realized by timers, and not by comparing timestamps on lookup. A record is thus
//! considered fresh until its timer has actually fired. Each timer is tagged with the record and
//! generation it was armed for, and is ignored if the record has since been replaced or moved on
//! to a newer generation.
//!
//! ## Metrics
//!
//! The following counters are collected:
//!
//! - `caches.access`: All lookups.
//! - `caches.memory.hit`: Lookups served by an existing record, fresh or stale.
//! - `caches.computation`: Productions that were started, tagged with `is_refresh`.
//! - `caches.refresh`: Background refreshes of expired records.
//! - `caches.computation.failed`: Productions that failed and deleted their record.
//! - `caches.expired` / `caches.evicted`: TTL timers that fired, per policy.
//!
//! Additionally, the `caches.records` gauge reports the number of records whenever one is
//! inserted or removed.
//!
//! ## [`CacheEntry`] / [`CacheError`]
//!
//! Every [`Computation`] resolves to a [`CacheEntry`], which is just an alias for a [`Result`]
//! around a [`CacheError`]. The most important variant is [`CacheError::MissingProducer`], which
//! is what a lookup without producer resolves to when there is no record for the key.

mod cache_error;
mod computation;
mod expiration;
mod memory;
mod record;

pub use cache_error::*;
pub use computation::{Computation, Lookup, Producer};
pub use expiration::{ExpirationPolicy, Ttl};
pub use memory::CoalescingCache;
