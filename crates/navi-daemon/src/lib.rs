//! `navi-daemon`
//!
//! I/O around [`navi_core`]: reads `logcat` navigation tags, samples vehicle speed and
//! the map-enable flag, runs the reconciliation engine and publishes `liveNaviData`.
//!
//! ## Modules
//!
//! - [`config`]: layered settings (defaults, TOML, `NAVI_` environment)
//! - [`source`]: logcat, file and stdin log sources
//! - [`speed`]: latest-value speed feed and its UDP listener
//! - [`flags`]: params-directory flag store
//! - [`publisher`]: JSON-lines, UDP and broadcast sinks
//! - [`service`]: the relay loop
//! - [`shutdown`]: cooperative shutdown handle
//! - [`priority`]: process nice value

pub mod config;
pub mod flags;
pub mod priority;
pub mod publisher;
pub mod service;
pub mod shutdown;
pub mod source;
pub mod speed;

pub use config::Settings;
pub use flags::ParamsDirStore;
pub use publisher::{BroadcastPublisher, JsonLinesPublisher, Publisher, UdpPublisher};
pub use service::{NaviService, ServiceStats};
pub use shutdown::Shutdown;
pub use source::{FileSource, LogSource, LogcatSource, ResumePoint, SourceEvent};
pub use speed::{SpeedFeed, SpeedSender};
