//! time utilities.
//!
//! Cache ages in keyward are expressed in unix seconds, read from a [`Clock`].
//! Production code uses the [`SystemClock`], tests drive a [`ManualClock`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time, in seconds since the unix epoch.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current unix timestamp in seconds.
    fn now_unix_secs(&self) -> u64;
}

impl<C: Clock> Clock for Arc<C> {
    #[inline]
    fn now_unix_secs(&self) -> u64 {
        self.as_ref().now_unix_secs()
    }
}

#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
/// [`Clock`] backed by [`SystemTime`].
pub struct SystemClock;

impl SystemClock {
    /// Create a new [`SystemClock`].
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_unix_secs(&self) -> u64 {
        unix_timestamp_secs()
    }
}

/// Returns the current unix timestamp in seconds.
///
/// A system clock set before the unix epoch reads as `0`.
#[must_use]
pub fn unix_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// [`Clock`] that only moves when told to.
///
/// Cloning a [`ManualClock`] shares the underlying time,
/// so a clone handed to a cache can be advanced from the test body.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a new [`ManualClock`] starting at the given unix timestamp (seconds).
    #[must_use]
    pub fn new(unix_secs: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(unix_secs)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs(), Ordering::SeqCst);
    }

    /// Set the clock to the given unix timestamp (seconds).
    pub fn set(&self, unix_secs: u64) {
        self.now.store(unix_secs, Ordering::SeqCst);
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now.load(Ordering::SeqCst))
            .finish()
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_unix_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
