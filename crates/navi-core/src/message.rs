//! Outbound `liveNaviData` message.

use serde::{Deserialize, Serialize};

use crate::event::NavigationEvent;
use crate::sign::TrafficType;

/// Read-only snapshot of the navigation event, published once per processed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveNaviData {
    /// Identifier of the log record that produced this snapshot.
    pub id: u64,
    /// Source timestamp, seconds, unmodified.
    pub ts: i64,
    /// Posted speed limit.
    pub speed_limit: f32,
    /// Distance to the upcoming sign, metres.
    pub speed_limit_distance: f32,
    /// Sign code.
    pub safety_sign: f32,
    /// Road curvature metric.
    pub road_curvature: f32,
    /// Turn-by-turn guidance code.
    pub turn_info: i32,
    /// Distance to the next turn.
    pub distance_to_turn: i32,
    /// External map feature flag.
    pub map_enable: bool,
    /// Event inside its visibility window.
    pub map_valid: bool,
    /// Enforcement classification.
    pub traffic_type: TrafficType,
    /// Projected seconds to the event point.
    pub arrival_sec: f64,
    /// Projected metres to the event point.
    pub arrival_distance: f64,
}

impl LiveNaviData {
    /// Snapshot `event` for record `id`.
    pub fn from_event(id: u64, event: &NavigationEvent, traffic_type: TrafficType) -> Self {
        Self {
            id,
            ts: event.source_timestamp,
            speed_limit: event.speed_limit,
            speed_limit_distance: event.speed_limit_distance,
            safety_sign: event.safety_sign,
            road_curvature: event.road_curvature,
            turn_info: event.turn_info,
            distance_to_turn: event.distance_to_turn,
            map_enable: event.map_enable,
            map_valid: event.map_valid,
            traffic_type,
            arrival_sec: event.arrival_time_sec,
            arrival_distance: event.arrival_distance,
        }
    }

    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
