//! Visibility scheduler: decides whether the current navigation event is still live.
//!
//! Two paths update the window:
//!
//! - **on-trigger** ([`VisibilityScheduler::trigger`]) runs synchronously when a new
//!   sign-type tag arrives. It projects the arrival time from the sign distance and the
//!   current speed and sets the hide timestamp accordingly.
//! - **per-cycle** ([`VisibilityScheduler::tick`]) runs for every processed record with
//!   the latest speed and the wall-clock time sampled for that cycle. While moving it
//!   counts the projection down and expires the event once it is stale or about to be
//!   passed. While stationary it freezes the countdown.
//!
//! ```text
//!            trigger                       speed <= 1 m/s
//!   Idle ─────────────────▶ Active ◀──────────────────────▶ (held)
//!    ▲                        │
//!    │  elapsed > 3 s  or  remaining < 2 s  (while moving)
//!    └────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::time_to_arrival;
use crate::event::NavigationEvent;
use crate::sign::{SafetySign, SECTION_ENFORCEMENT_RANGE_M};

/// Thresholds of the visibility window.
///
/// Defaults reproduce the navigation display's established timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Speed above which the vehicle counts as moving, m/s.
    pub moving_speed_mps: f64,
    /// Age after which a moving event expires, seconds.
    pub stale_after_secs: f64,
    /// Remaining time below which a moving event expires, seconds.
    pub min_remaining_secs: f64,
    /// Display floor for events without usable distance, seconds.
    pub min_display_secs: f64,
    /// Distances at or below this are not usable for projection, metres.
    pub min_event_distance_m: f64,
    /// Substitute distance for speed bumps reported without distance, metres.
    pub speed_bump_lookahead_m: f64,
    /// Section enforcement counts as active below this distance, metres.
    pub section_enforcement_range_m: f32,
    /// Remaining time assumed before any moving cycle has been observed, seconds.
    pub initial_remaining_secs: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            moving_speed_mps: 1.0,
            stale_after_secs: 3.0,
            min_remaining_secs: 2.0,
            min_display_secs: 3.0,
            min_event_distance_m: 10.0,
            speed_bump_lookahead_m: 200.0,
            section_enforcement_range_m: SECTION_ENFORCEMENT_RANGE_M,
            initial_remaining_secs: 1.0,
        }
    }
}

/// Whether an event is currently being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tracking {
    /// No event, or the last one expired.
    #[default]
    Idle,
    /// An event is inside its visibility window.
    Active,
}

/// Conceptual phase observed at the end of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisibilityPhase {
    /// Nothing tracked.
    NoActiveEvent,
    /// Visible, vehicle moving toward the event.
    Approaching,
    /// Visible, vehicle stationary; countdown frozen.
    Held,
    /// Expired during this cycle.
    Expired,
}

/// Why a moving event stopped being visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiryReason {
    /// The triggering sign is older than the staleness limit.
    Stale,
    /// The projected arrival is imminent or already passed.
    Arrived,
}

/// Owns the tracking state and drives the event's visibility fields.
#[derive(Debug, Clone)]
pub struct VisibilityScheduler {
    config: VisibilityConfig,
    tracking: Tracking,
    last_remaining_secs: f64,
    last_expiry: Option<ExpiryReason>,
}

impl Default for VisibilityScheduler {
    fn default() -> Self {
        Self::new(VisibilityConfig::default())
    }
}

impl VisibilityScheduler {
    /// Create a scheduler in the idle state.
    pub fn new(config: VisibilityConfig) -> Self {
        Self {
            config,
            tracking: Tracking::Idle,
            last_remaining_secs: config.initial_remaining_secs,
            last_expiry: None,
        }
    }

    /// Thresholds in use.
    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    /// Current tracking state.
    pub fn tracking(&self) -> Tracking {
        self.tracking
    }

    /// Whether an event is being tracked.
    pub fn is_active(&self) -> bool {
        self.tracking == Tracking::Active
    }

    /// Remaining time carried across cycles for the stationary hold.
    pub fn last_remaining_secs(&self) -> f64 {
        self.last_remaining_secs
    }

    /// Reason for the most recent expiry, if any.
    pub fn last_expiry(&self) -> Option<ExpiryReason> {
        self.last_expiry
    }

    /// Distance used to project the event, after the speed-bump substitution.
    pub fn event_distance(&self, event: &NavigationEvent) -> f64 {
        let distance = f64::from(event.speed_limit_distance);
        if distance <= self.config.min_event_distance_m
            && event.sign_code() == SafetySign::SpeedBump.code()
        {
            self.config.speed_bump_lookahead_m
        } else {
            distance
        }
    }

    /// On-trigger recompute. `event.event_timestamp_sec` must already hold the trigger time.
    pub fn trigger(&mut self, event: &mut NavigationEvent, speed_mps: f64) {
        let distance = self.event_distance(event);

        if distance > self.config.min_event_distance_m {
            let arrival = time_to_arrival(distance, speed_mps);
            event.hide_timestamp_sec = event.event_timestamp_sec + arrival;
            event.arrival_time_sec = arrival;
            event.arrival_distance = distance;
        } else {
            event.hide_timestamp_sec = event.event_timestamp_sec + self.config.min_display_secs;
        }

        self.tracking = Tracking::Active;
        debug!(
            sign = event.sign_code(),
            distance,
            speed_mps,
            hide_at = event.hide_timestamp_sec,
            "Navigation event triggered"
        );
    }

    /// Per-cycle recompute at time `now` with the latest known speed.
    pub fn tick(&mut self, event: &mut NavigationEvent, speed_mps: f64, now: f64) -> VisibilityPhase {
        let phase = match self.tracking {
            Tracking::Active if speed_mps > self.config.moving_speed_mps => {
                let elapsed = now - event.event_timestamp_sec;
                let remaining = event.hide_timestamp_sec - now;
                self.last_remaining_secs = remaining;
                event.arrival_time_sec = remaining;
                event.arrival_distance = remaining * speed_mps;

                let expiry = if elapsed > self.config.stale_after_secs {
                    Some(ExpiryReason::Stale)
                } else if remaining < self.config.min_remaining_secs {
                    Some(ExpiryReason::Arrived)
                } else {
                    None
                };

                match expiry {
                    Some(reason) => {
                        self.tracking = Tracking::Idle;
                        self.last_expiry = Some(reason);
                        debug!(?reason, elapsed, remaining, "Navigation event expired");
                        VisibilityPhase::Expired
                    }
                    None => VisibilityPhase::Approaching,
                }
            }
            Tracking::Active => {
                event.hide_timestamp_sec = now + self.last_remaining_secs;
                VisibilityPhase::Held
            }
            Tracking::Idle => {
                event.hide_timestamp_sec = now + self.config.min_display_secs;
                VisibilityPhase::NoActiveEvent
            }
        };

        event.map_valid = self.is_active();
        trace!(?phase, map_valid = event.map_valid, "Visibility tick");
        phase
    }
}
