//! Helpers for testing the cache engine.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - Producers handed out by a [`CallCounter`] only count an invocation once the cache actually
//!    calls them. Creating a producer and passing it to a lookup that is served from the cache
//!    leaves the counter untouched, which is what single-flight tests assert on.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test, e.g. `let _dir = test::tempdir();`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `flightcache` crate and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("flightcache=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Hands out producers and counts how many of them were invoked.
///
/// Clones share the same counter.
#[derive(Clone, Debug, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of producers that have been invoked so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn producer<T, F>(
        &self,
        f: F,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + use<T, F>
    where
        T: Send + 'static,
        F: FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + 'static,
    {
        let calls = Arc::clone(&self.calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            f()
        }
    }

    /// A producer that resolves to `value` right away.
    pub fn returning<T>(
        &self,
        value: T,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + use<T>
    where
        T: Send + 'static,
    {
        self.producer(move || async move { anyhow::Ok(value) }.boxed())
    }

    /// A producer that resolves to `value` after `delay`.
    pub fn delayed<T>(
        &self,
        value: T,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + use<T>
    where
        T: Send + 'static,
    {
        self.producer(move || {
            async move {
                tokio::time::sleep(delay).await;
                anyhow::Ok(value)
            }
            .boxed()
        })
    }

    /// A producer that fails with `message`.
    pub fn failing<T>(
        &self,
        message: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + use<T>
    where
        T: Send + 'static,
    {
        self.producer(move || async move { Err::<T, _>(anyhow::anyhow!(message)) }.boxed())
    }

    /// A producer that fails with `message` after `delay`.
    pub fn failing_after<T>(
        &self,
        message: &'static str,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + use<T>
    where
        T: Send + 'static,
    {
        self.producer(move || {
            async move {
                tokio::time::sleep(delay).await;
                Err::<T, _>(anyhow::anyhow!(message))
            }
            .boxed()
        })
    }

    /// A producer that never settles.
    pub fn pending<T>(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + use<T>
    where
        T: Send + 'static,
    {
        self.producer(|| futures::future::pending::<anyhow::Result<T>>().boxed())
    }

    /// A producer that panics while it is being polled.
    pub fn panicking<T>(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send + use<T>
    where
        T: Send + 'static,
    {
        self.producer(|| explode::<T>().boxed())
    }
}

async fn explode<T>() -> anyhow::Result<T> {
    panic!("producer panicked")
}
