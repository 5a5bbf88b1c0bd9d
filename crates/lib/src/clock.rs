//! Time provider abstraction
//!
//! This module provides a [`Clock`] trait that abstracts over time sources,
//! allowing production code to use real system time while tests can use
//! controllable mock time. Register timestamps and tag prefixes are both
//! derived from [`Clock::now_micros`].
//!
//! # Example
//!
//! ```
//! use driftdoc::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! let micros = clock.now_micros();
//! assert!(micros > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;

/// A time provider for getting current timestamps.
///
/// This trait abstracts over time sources to enable:
/// - Controllable time in tests (fixed starting point, manual advance)
/// - Monotonic timestamps within a single clock instance
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as microseconds since Unix epoch.
    fn now_micros(&self) -> u64;
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Test clock with auto-advancing time.
///
/// This clock auto-advances by one microsecond on each `now_micros()` call,
/// providing monotonically increasing timestamps. Use `hold()` to temporarily
/// freeze the clock for tests needing identical timestamps on two replicas.
///
/// # Example
///
/// ```
/// use driftdoc::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1000);
/// let t1 = clock.now_micros();
/// let t2 = clock.now_micros();
/// assert!(t2 > t1);
///
/// {
///     let _hold = clock.hold();
///     assert_eq!(clock.now_micros(), clock.now_micros());
/// }
/// ```
#[cfg(any(test, feature = "testing"))]
pub struct FixedClock {
    state: Mutex<FixedClockState>,
}

#[cfg(any(test, feature = "testing"))]
struct FixedClockState {
    micros: u64,
    held: bool,
}

/// RAII guard that freezes a [`FixedClock`] while held.
///
/// The clock resumes auto-advancing when this guard is dropped.
#[cfg(any(test, feature = "testing"))]
pub struct ClockHold<'a>(&'a FixedClock);

#[cfg(any(test, feature = "testing"))]
impl Drop for ClockHold<'_> {
    fn drop(&mut self) {
        self.0.state.lock().unwrap().held = false;
    }
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// Create a new fixed clock with the given initial time in microseconds.
    pub fn new(micros: u64) -> Self {
        Self {
            state: Mutex::new(FixedClockState {
                micros,
                held: false,
            }),
        }
    }

    /// Hold the clock, preventing auto-advance until the guard is dropped.
    pub fn hold(&self) -> ClockHold<'_> {
        self.state.lock().unwrap().held = true;
        ClockHold(self)
    }

    /// Advance the clock by the given number of microseconds.
    pub fn advance(&self, us: u64) {
        self.state.lock().unwrap().micros += us;
    }

    /// Set the clock to a specific time in microseconds.
    pub fn set(&self, us: u64) {
        self.state.lock().unwrap().micros = us;
    }

    /// Get the current time without advancing (even if not held).
    pub fn get(&self) -> u64 {
        self.state.lock().unwrap().micros
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_micros(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        if state.held {
            state.micros
        } else {
            let t = state.micros;
            state.micros += 1;
            t
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1_704_067_200_000_000)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Debug for FixedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("FixedClock")
            .field("micros", &state.micros)
            .field("held", &state.held)
            .finish()
    }
}
