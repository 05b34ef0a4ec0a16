//! Time source abstraction
//!
//! Time-referenced keys and time-based identifiers read "now" through a
//! [`Clock`] so tests can drive time deterministically.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Source of the current time in whole seconds.
///
/// The epoch is up to the implementation (Unix time, GPS time, time since
/// network sync); both ends of a link must agree on it.
pub trait Clock: Send + Sync {
    /// Current time in seconds, wrapping at `u32::MAX`.
    fn now_secs(&self) -> u32;
}

/// Wall clock: seconds since the Unix epoch, truncated to 32 bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u32 {
        let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        secs as u32
    }
}

/// Manually driven clock for tests and simulation.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    /// Clock frozen at `now` seconds.
    pub fn new(now: u32) -> Self {
        Self { now: Arc::new(AtomicU32::new(now)) }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: u32) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move time forward by `secs`.
    pub fn advance(&self, secs: u32) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}
