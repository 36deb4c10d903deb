//! `navi-core`
//!
//! Reconciliation and visibility logic for navigation telemetry.
//!
//! A navigation process logs partial updates (distance to the next sign, posted speed
//! limit, sign type, curvature, turn guidance) one tag at a time. This crate merges
//! them into one denormalized [`NavigationEvent`], decides how long that event stays
//! visible given the vehicle speed and elapsed time, and produces the outbound
//! [`LiveNaviData`] snapshot.
//!
//! ## Modules
//!
//! - [`sign`]: sign vocabulary and enforcement classification
//! - [`clock`]: arrival-time math and time sources
//! - [`tag`]: tag vocabulary and payload parsing
//! - [`reconciler`]: per-tag dispatch and the rate-limited flag refresh
//! - [`visibility`]: the visibility state machine
//! - [`engine`]: one full processing cycle
//!
//! Everything here is synchronous and allocation-light; I/O lives in `navi-daemon`.

pub mod clock;
pub mod engine;
pub mod error;
pub mod event;
pub mod flags;
pub mod message;
pub mod reconciler;
pub mod record;
pub mod sign;
pub mod tag;
pub mod visibility;

pub use clock::{log_timestamp_to_millis, time_to_arrival, Clock, ManualClock, SystemClock};
pub use engine::{CycleOutput, EngineConfig, NaviEngine};
pub use error::{NaviError, NaviResult};
pub use event::NavigationEvent;
pub use flags::{FixedFlags, FlagStore, MAP_ENABLE_KEY};
pub use message::LiveNaviData;
pub use reconciler::{Reconciled, Reconciler, ReconcilerConfig};
pub use record::LogRecord;
pub use sign::{classify, SafetySign, TrafficType};
pub use tag::{parse_payload, NaviTag, PayloadPolicy};
pub use visibility::{ExpiryReason, Tracking, VisibilityConfig, VisibilityPhase, VisibilityScheduler};
