use std::time::Duration;

/// How long a produced value stays fresh.
///
/// The TTL starts when a production settles successfully, not when it is started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// The value never expires.
    #[default]
    Never,
    /// The value expires after the given duration.
    ///
    /// A zero duration expires the value right after it was produced.
    After(Duration),
}

impl Ttl {
    /// Creates a TTL from a number of milliseconds.
    ///
    /// Negative values are the "never expire" sentinel.
    pub fn from_millis(millis: i64) -> Self {
        match u64::try_from(millis) {
            Ok(millis) => Self::After(Duration::from_millis(millis)),
            Err(_) => Self::Never,
        }
    }

    /// Returns the duration after which the value expires, or `None` if it never does.
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::After(duration) => Some(duration),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Never, Self::After)
    }
}

/// What happens to a record once its TTL has elapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// The record is marked as expired and keeps serving its last value, while the next lookup
    /// with a producer refreshes it in the background.
    StaleWhileRevalidate,
    /// The record is deleted, and the next lookup is a cold miss.
    EvictOnExpire,
}

impl ExpirationPolicy {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::StaleWhileRevalidate => "stale-while-revalidate",
            Self::EvictOnExpire => "evict-on-expire",
        }
    }
}

/// A scheduled expiration, bound to one generation of one record.
///
/// Expirations that no longer match the record they were scheduled for are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Expiration {
    pub record: u64,
    pub generation: u64,
}
