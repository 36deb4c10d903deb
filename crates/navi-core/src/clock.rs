//! Time sources and arrival projections.
//!
//! The engine samples the clock exactly once per cycle. Log-record timestamps are
//! only used for pass-through and the flag-refresh cadence, never as the event clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Convert a log record timestamp into milliseconds.
///
/// Sub-millisecond precision is floored.
pub fn log_timestamp_to_millis(sec: i64, nsec: i64) -> i64 {
    sec.saturating_mul(1000).saturating_add(nsec / 1_000_000)
}

/// Seconds until the vehicle reaches a point `distance_m` ahead.
///
/// A stationary vehicle (speed exactly zero) yields `distance_m` itself. That value is
/// a fallback rather than a time; callers treat the hovering case separately.
pub fn time_to_arrival(distance_m: f64, speed_mps: f64) -> f64 {
    if speed_mps == 0.0 {
        distance_m
    } else {
        distance_m / speed_mps
    }
}

/// Source of "now" in seconds.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now_secs(&self) -> f64;
}

/// Wall clock, seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start` seconds.
    pub fn new(start: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let now = self.now_secs();
        self.set(now + secs);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
