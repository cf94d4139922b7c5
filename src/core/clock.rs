//! Time Sources
//!
//! The round scheduler only ever asks "how many seconds have elapsed?".
//! Production code reads a monotonic clock; tests drive a manual one.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Source of monotonic elapsed time, in seconds.
///
/// Read concurrently from the background loop and from event handlers,
/// so implementations must be thread-safe.
pub trait Clock: Send + Sync {
    /// Seconds elapsed since this clock's epoch.
    fn now(&self) -> f64;
}

/// Real clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is now.
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Manually driven clock.
///
/// Clones share the same reading, so a test can keep one handle and
/// hand another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Create a clock reading `initial` seconds.
    pub fn new(initial: f64) -> Self {
        Self {
            seconds: Arc::new(Mutex::new(initial)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, seconds: f64) {
        let mut current = self.seconds.lock().unwrap_or_else(|e| e.into_inner());
        *current += seconds;
    }

    /// Set the clock to an absolute reading.
    pub fn set(&self, seconds: f64) {
        let mut current = self.seconds.lock().unwrap_or_else(|e| e.into_inner());
        *current = seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.seconds.lock().unwrap_or_else(|e| e.into_inner())
    }
}
