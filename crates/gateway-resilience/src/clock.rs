//! Time source for store-backed state.
//!
//! Every component reads the current time through [`Clock`] so windows,
//! recovery timeouts and TTL expiry can be driven deterministically in tests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock source measured from the unix epoch
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since the unix epoch
    fn now(&self) -> Duration;

    /// Whole unix seconds
    fn unix_seconds(&self) -> u64 {
        self.now().as_secs()
    }

    /// Unix seconds with sub-second precision
    fn unix_seconds_f64(&self) -> f64 {
        self.now().as_secs_f64()
    }
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at the given unix time
    #[must_use]
    pub fn new(start: Duration) -> Self {
        Self {
            millis: AtomicU64::new(start.as_millis() as u64),
        }
    }

    /// Create a clock starting at the given unix second
    #[must_use]
    pub fn at_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute unix time
    pub fn set(&self, to: Duration) {
        self.millis.store(to.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}
