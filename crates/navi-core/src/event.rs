//! The denormalized "current navigation event".
//!
//! Exactly one [`NavigationEvent`] exists per engine. Every tag overwrites its own
//! field in place; there is no history. `map_valid`, `arrival_*` and the timestamps are
//! owned by the visibility scheduler and are never written from tag input.

use serde::{Deserialize, Serialize};

use crate::sign::{classify_with_range, SafetySign, TrafficType};

/// Latest known value of every navigation field plus visibility timers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationEvent {
    /// Posted speed limit.
    pub speed_limit: f32,
    /// Distance to the upcoming sign, metres.
    pub speed_limit_distance: f32,
    /// Code of the most recent sign.
    pub safety_sign: f32,
    /// Road curvature metric.
    pub road_curvature: f32,
    /// Turn-by-turn guidance code.
    pub turn_info: i32,
    /// Distance to the next turn.
    pub distance_to_turn: i32,
    /// Event currently inside its visibility window.
    pub map_valid: bool,
    /// External "map enabled" feature flag.
    pub map_enable: bool,
    /// Projected remaining distance to the event point, metres.
    pub arrival_distance: f64,
    /// Projected remaining time to the event point, seconds.
    pub arrival_time_sec: f64,
    /// When the current sign event was last (re)established.
    pub event_timestamp_sec: f64,
    /// When the event expires absent renewal.
    pub hide_timestamp_sec: f64,
    /// Seconds of the originating log record.
    pub source_timestamp: i64,
}

impl NavigationEvent {
    /// Sign code as an integer.
    pub fn sign_code(&self) -> i32 {
        self.safety_sign as i32
    }

    /// Known sign for the current code, if any.
    pub fn sign(&self) -> Option<SafetySign> {
        SafetySign::from_code(self.sign_code())
    }

    /// Enforcement classification from the current field values.
    pub fn traffic_type(&self, section_range_m: f32) -> TrafficType {
        classify_with_range(self.sign_code(), self.speed_limit_distance, section_range_m).into()
    }
}
