use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;

/// An error that happens when reading or producing a cached value.
///
/// Errors are shared between every listener of a failed [`Computation`](super::Computation),
/// which is why this type is cheaply [`Clone`]able.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// There is no record for the key, and the lookup did not supply a producer to create one.
    #[error("no cached value and no producer supplied")]
    MissingProducer,
    /// The producer returned an error.
    ///
    /// The record for the key has been removed.
    #[error("producer failed: {0:#}")]
    Producer(Arc<anyhow::Error>),
    /// The production panicked, or its task was cancelled before it settled.
    ///
    /// The record for the key has been removed. For a task cancelled by a runtime shutdown, this
    /// happens once the computation is awaited.
    #[error("computation aborted")]
    Aborted,
}

impl From<JoinError> for CacheError {
    #[track_caller]
    fn from(err: JoinError) -> Self {
        let dynerr: &dyn std::error::Error = &err; // tracing expects a `&dyn Error`
        tracing::error!(error = dynerr, "Cache production task did not complete");
        Self::Aborted
    }
}

impl CacheError {
    pub(super) fn from_producer(err: anyhow::Error) -> Self {
        Self::Producer(Arc::new(err))
    }

    /// Returns the error of the producer, if this is a [`Producer`](Self::Producer) error.
    pub fn producer_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Producer(err) => Some(err),
            _ => None,
        }
    }
}

/// The outcome of a cache lookup, containing either `Ok(T)` or the reason why no value could be
/// provided.
pub type CacheEntry<T> = Result<T, CacheError>;
