use tokio::task::AbortHandle;

use super::computation::Computation;
use super::expiration::Expiration;

/// The state the cache keeps for a single key.
///
/// Records are only ever written by the [`CoalescingCache`](super::CoalescingCache) that owns
/// them.
pub(super) struct CacheRecord<T> {
    /// Unique among all records created by one cache.
    pub id: u64,
    /// The current computation, pending or settled.
    pub value: Computation<T>,
    /// Whether the TTL of the current generation has elapsed.
    pub expired: bool,
    /// A refresh that has been started but has not settled yet.
    pub next_value: Option<Computation<T>>,
    /// Incremented with every successful production.
    pub generation: u64,
    /// The armed TTL timer of the current generation.
    pub timer: Option<AbortHandle>,
}

impl<T> CacheRecord<T> {
    pub fn new(id: u64, value: Computation<T>) -> Self {
        Self {
            id,
            value,
            expired: false,
            next_value: None,
            generation: 0,
            timer: None,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.next_value.is_some()
    }

    pub fn expiration(&self) -> Expiration {
        Expiration {
            record: self.id,
            generation: self.generation,
        }
    }

    /// Replaces the TTL timer, aborting the previous one.
    pub fn set_timer(&mut self, timer: Option<AbortHandle>) {
        if let Some(previous) = std::mem::replace(&mut self.timer, timer) {
            previous.abort();
        }
    }
}

impl<T> Drop for CacheRecord<T> {
    fn drop(&mut self) {
        self.set_timer(None);
    }
}
