//! One processing cycle: flag refresh, reconcile, visibility tick, snapshot.
//!
//! [`NaviEngine`] owns the navigation event for its whole lifetime; the service loop
//! owns the engine and calls [`NaviEngine::cycle`] once per delivered log record.
//!
//! # Example
//!
//! ```rust
//! use navi_core::{FixedFlags, LogRecord, NaviEngine};
//!
//! let mut engine = NaviEngine::default();
//! let flags = FixedFlags(Some(1));
//!
//! engine.cycle(&LogRecord::new(1, 100, 0, "opkrspddist", "500"), 20.0, 100.0, &flags);
//! let out = engine.cycle(&LogRecord::new(2, 100, 0, "opkrsigntype", "131"), 20.0, 100.0, &flags);
//!
//! assert!(out.message.map_valid);
//! assert_eq!(out.message.arrival_sec, 25.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::event::NavigationEvent;
use crate::flags::FlagStore;
use crate::message::LiveNaviData;
use crate::reconciler::{Reconciled, Reconciler, ReconcilerConfig};
use crate::record::LogRecord;
use crate::visibility::{VisibilityConfig, VisibilityPhase, VisibilityScheduler};

/// Engine settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tag dispatch and flag refresh.
    pub reconciler: ReconcilerConfig,
    /// Visibility window thresholds.
    pub visibility: VisibilityConfig,
}

/// What one cycle did, plus the message to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    /// Outcome of tag dispatch.
    pub reconciled: Reconciled,
    /// Visibility phase after the tick.
    pub phase: VisibilityPhase,
    /// Whether `map_enable` was refreshed this cycle.
    pub flags_refreshed: bool,
    /// Snapshot to publish.
    pub message: LiveNaviData,
}

/// Navigation event plus the machinery that mutates it.
#[derive(Debug, Clone, Default)]
pub struct NaviEngine {
    event: NavigationEvent,
    reconciler: Reconciler,
    scheduler: VisibilityScheduler,
}

impl NaviEngine {
    /// Create an engine with an all-zero event.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            event: NavigationEvent::default(),
            reconciler: Reconciler::new(config.reconciler),
            scheduler: VisibilityScheduler::new(config.visibility),
        }
    }

    /// Current event state.
    pub fn event(&self) -> &NavigationEvent {
        &self.event
    }

    /// Visibility scheduler state.
    pub fn scheduler(&self) -> &VisibilityScheduler {
        &self.scheduler
    }

    /// Process one record with the latest speed (m/s) and the cycle's wall-clock time.
    pub fn cycle(
        &mut self,
        record: &LogRecord,
        speed_mps: f32,
        now: f64,
        flags: &dyn FlagStore,
    ) -> CycleOutput {
        let speed = f64::from(speed_mps);
        self.event.source_timestamp = record.sec;

        let flags_refreshed = self.reconciler.refresh_flags(&mut self.event, record.sec, flags);
        let reconciled = self.reconciler.apply(
            &mut self.event,
            &mut self.scheduler,
            &record.tag,
            &record.message,
            now,
            speed,
        );
        let phase = self.scheduler.tick(&mut self.event, speed, now);

        let traffic_type = self
            .event
            .traffic_type(self.scheduler.config().section_enforcement_range_m);
        let message = LiveNaviData::from_event(record.id, &self.event, traffic_type);

        CycleOutput {
            reconciled,
            phase,
            flags_refreshed,
            message,
        }
    }
}
