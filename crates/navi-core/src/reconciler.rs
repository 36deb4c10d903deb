//! Event reconciler: applies one tag update at a time to the navigation event.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::NavigationEvent;
use crate::flags::{FlagStore, MAP_ENABLE_KEY};
use crate::tag::{NaviTag, PayloadPolicy};
use crate::visibility::VisibilityScheduler;

/// Reconciler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Handling of payloads without a leading integer.
    pub payload_policy: PayloadPolicy,
    /// Log-time seconds between `map_enable` refreshes.
    pub flag_refresh_secs: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            payload_policy: PayloadPolicy::Zero,
            flag_refresh_secs: 5,
        }
    }
}

/// Result of reconciling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Tag is outside the vocabulary.
    Ignored,
    /// Payload carried no integer and the policy said skip.
    Skipped(NaviTag),
    /// A plain field was overwritten.
    Updated(NaviTag),
    /// A new sign arrived and the visibility window was recomputed.
    Triggered,
}

impl Reconciled {
    /// Whether the record belonged to the navigation vocabulary.
    pub fn is_navigation(self) -> bool {
        !matches!(self, Reconciled::Ignored)
    }
}

/// Tag dispatcher plus the rate-limited `map_enable` refresh.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcilerConfig,
    last_flag_refresh: Option<i64>,
}

impl Reconciler {
    /// Create a reconciler.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            last_flag_refresh: None,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Refresh `map_enable` if the refresh interval has elapsed in log time.
    ///
    /// The first call always refreshes. Returns whether the store was consulted. A failed
    /// read keeps the previous value.
    pub fn refresh_flags(
        &mut self,
        event: &mut NavigationEvent,
        log_sec: i64,
        flags: &dyn FlagStore,
    ) -> bool {
        let due = match self.last_flag_refresh {
            None => true,
            Some(last) => log_sec.saturating_sub(last) >= self.config.flag_refresh_secs,
        };
        if !due {
            return false;
        }

        self.last_flag_refresh = Some(log_sec);
        match flags.get_int(MAP_ENABLE_KEY) {
            Ok(value) => {
                let enabled = value.unwrap_or(0) != 0;
                if enabled != event.map_enable {
                    debug!(enabled, "Map enable flag changed");
                }
                event.map_enable = enabled;
            }
            Err(e) => warn!(error = %e, "Failed to read map enable flag"),
        }
        true
    }

    /// Apply one `(tag, payload)` update observed at wall-clock `now`.
    ///
    /// A sign-type update stamps the event and runs the scheduler's on-trigger path with
    /// `speed_mps`.
    pub fn apply(
        &self,
        event: &mut NavigationEvent,
        scheduler: &mut VisibilityScheduler,
        tag: &str,
        payload: &str,
        now: f64,
        speed_mps: f64,
    ) -> Reconciled {
        let Some(tag) = NaviTag::from_tag(tag) else {
            return Reconciled::Ignored;
        };
        let Some(value) = self.config.payload_policy.resolve(payload) else {
            debug!(%tag, payload, "Skipping non-numeric payload");
            return Reconciled::Skipped(tag);
        };

        match tag {
            NaviTag::SpeedLimitDistance => event.speed_limit_distance = value as f32,
            NaviTag::SpeedLimit => event.speed_limit = value as f32,
            NaviTag::Curvature => event.road_curvature = value as f32,
            NaviTag::TurnInfo => event.turn_info = saturate_i32(value),
            NaviTag::DistanceToTurn => event.distance_to_turn = saturate_i32(value),
            NaviTag::SignType => {
                event.safety_sign = value as f32;
                event.event_timestamp_sec = now;
                scheduler.trigger(event, speed_mps);
                return Reconciled::Triggered;
            }
        }

        Reconciled::Updated(tag)
    }
}

fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}
