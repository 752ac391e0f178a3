use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::cache_error::{CacheEntry, CacheError};

/// Something that can produce a value for the cache.
///
/// This is implemented for every `FnOnce()` returning a `Send` future that resolves to a
/// `Result`, as long as the error converts into an [`anyhow::Error`].
///
/// The producer is invoked at most once, inside a background task of the cache.
pub trait Producer<T>: Send + 'static {
    /// Invokes the producer.
    fn produce(self) -> BoxFuture<'static, anyhow::Result<T>>;
}

impl<T, F, Fut, E> Producer<T> for F
where
    T: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error>,
{
    fn produce(self) -> BoxFuture<'static, anyhow::Result<T>> {
        let computation = self();
        async move { computation.await.map_err(Into::into) }.boxed()
    }
}

/// A handle to one production of a cached value.
///
/// Every clone is an independent listener on the same underlying computation, which runs at most
/// once. All listeners are resolved together when it settles.
pub struct Computation<T> {
    inner: Shared<BoxFuture<'static, CacheEntry<T>>>,
}

impl<T> Computation<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(super) fn new<F>(future: F) -> Self
    where
        F: Future<Output = CacheEntry<T>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// A computation that has already failed with `err`.
    pub(super) fn failed(err: CacheError) -> Self {
        Self::new(futures::future::ready(Err(err)))
    }

    /// Returns `true` if both handles listen to the same production.
    ///
    /// Like [`Shared::ptr_eq`], this returns `false` once either handle has been polled to
    /// completion.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the settled result, if the computation has settled already.
    pub fn peek(&self) -> Option<&CacheEntry<T>> {
        self.inner.peek()
    }
}

impl<T> Clone for Computation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Future for Computation<T>
where
    T: Clone,
{
    type Output = CacheEntry<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T> fmt::Debug for Computation<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("settled", &self.peek().is_some())
            .finish()
    }
}

/// The result of [`CoalescingCache::lookup`](super::CoalescingCache::lookup).
pub struct Lookup<T> {
    /// The record's current value, which is stale if a refresh was started.
    pub value: Computation<T>,
    /// The refresh this lookup started in the background, if any.
    ///
    /// It resolves with the freshly produced value, or with the producer's failure. Other
    /// lookups only observe the refreshed value once it has settled and replaced the stale one.
    pub refresh: Option<Computation<T>>,
}

impl<T> fmt::Debug for Lookup<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("value", &self.value)
            .field("refresh", &self.refresh)
            .finish()
    }
}
