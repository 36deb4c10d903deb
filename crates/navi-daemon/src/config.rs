//! Daemon configuration.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. Library defaults ([`Settings::default`])
//! 2. Optional TOML file (`--config`)
//! 3. `NAVI_`-prefixed environment variables, `__` separating nested keys
//!    (e.g. `NAVI_SPEED__FIXED_MPS=12.5`, `NAVI_ENGINE__RECONCILER__PAYLOAD_POLICY=skip`)
//!
//! ## Schema
//!
//! ```toml
//! log_level = "info"
//! json_logs = false
//! priority = -15
//!
//! [source]
//! kind = "logcat"          # logcat | file | stdin
//! command = "logcat"
//! args = ["-v", "epoch"]
//! reconnect_backoff_ms = 500
//!
//! [speed]
//! kind = "udp"             # fixed | udp
//! udp_bind = "127.0.0.1:8011"
//!
//! [flags]
//! kind = "params"          # params | fixed
//! params_dir = "/data/params/d"
//!
//! [publish]
//! sinks = ["stdout"]       # stdout | file | udp
//! udp_target = "127.0.0.1:8012"
//!
//! [engine.reconciler]
//! payload_policy = "zero"  # zero | skip
//! flag_refresh_secs = 5
//!
//! [engine.visibility]
//! moving_speed_mps = 1.0
//! stale_after_secs = 3.0
//! ```
//!
//! After extraction [`Settings::validate`] rejects values that parse but make no sense.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use navi_core::{EngineConfig, NaviError};
use serde::{Deserialize, Serialize};

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Logging verbosity when `RUST_LOG` is not set.
    pub log_level: String,
    /// Emit logs as JSON lines.
    pub json_logs: bool,
    /// Process nice value applied at startup; `None` leaves it unchanged.
    pub priority: Option<i32>,
    /// Where log records come from.
    pub source: SourceSettings,
    /// Where vehicle speed comes from.
    pub speed: SpeedSettings,
    /// Where the map-enable flag comes from.
    pub flags: FlagSettings,
    /// Where snapshots go.
    pub publish: PublishSettings,
    /// Reconciliation and visibility thresholds.
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            priority: Some(-15),
            source: SourceSettings::default(),
            speed: SpeedSettings::default(),
            flags: FlagSettings::default(),
            publish: PublishSettings::default(),
            engine: EngineConfig::default(),
        }
    }
}

/// Log source kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Spawn `logcat` and read its output.
    Logcat,
    /// Read a captured logcat file.
    File,
    /// Read logcat lines piped on stdin.
    Stdin,
}

/// Log source settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    /// Source kind.
    pub kind: SourceKind,
    /// Program to spawn for [`SourceKind::Logcat`].
    pub command: String,
    /// Arguments for the program; must select the `epoch` output format.
    pub args: Vec<String>,
    /// Capture file for [`SourceKind::File`].
    pub path: Option<PathBuf>,
    /// Delay before reopening an exhausted source, milliseconds.
    pub reconnect_backoff_ms: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Logcat,
            command: "logcat".to_string(),
            args: vec!["-v".to_string(), "epoch".to_string()],
            path: None,
            reconnect_backoff_ms: 500,
        }
    }
}

impl SourceSettings {
    /// Reconnect backoff as a duration.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

/// Vehicle speed source kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeedKind {
    /// Constant speed, for bench runs and replays.
    Fixed,
    /// Latest datagram received on a UDP socket.
    Udp,
}

/// Vehicle speed settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeedSettings {
    /// Source kind.
    pub kind: SpeedKind,
    /// Speed for [`SpeedKind::Fixed`], m/s.
    pub fixed_mps: f32,
    /// Bind address for [`SpeedKind::Udp`].
    pub udp_bind: String,
}

impl Default for SpeedSettings {
    fn default() -> Self {
        Self {
            kind: SpeedKind::Udp,
            fixed_mps: 0.0,
            udp_bind: "127.0.0.1:8011".to_string(),
        }
    }
}

/// Flag store kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// One file per key under a params directory.
    Params,
    /// A constant value.
    Fixed,
}

/// Flag store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlagSettings {
    /// Store kind.
    pub kind: FlagKind,
    /// Params directory for [`FlagKind::Params`].
    pub params_dir: PathBuf,
    /// Value for [`FlagKind::Fixed`]; unset means "flag missing".
    pub fixed: Option<i64>,
}

impl Default for FlagSettings {
    fn default() -> Self {
        Self {
            kind: FlagKind::Params,
            params_dir: PathBuf::from("/data/params/d"),
            fixed: None,
        }
    }
}

/// Publish sink kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// JSON lines on stdout.
    Stdout,
    /// JSON lines appended to a file.
    File,
    /// One JSON datagram per message.
    Udp,
}

/// Publish settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishSettings {
    /// Enabled sinks.
    pub sinks: Vec<SinkKind>,
    /// Output file for [`SinkKind::File`].
    pub path: Option<PathBuf>,
    /// Destination for [`SinkKind::Udp`].
    pub udp_target: Option<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            sinks: vec![SinkKind::Stdout],
            path: None,
            udp_target: None,
        }
    }
}

impl Settings {
    /// Build the layered figment without extracting it.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("NAVI_").split("__"))
    }

    /// Load, merge and validate settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }
        let settings: Settings = Self::figment(path)
            .extract()
            .context("Failed to load configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that parse but are unusable.
    pub fn validate(&self) -> Result<(), NaviError> {
        let invalid = |msg: String| -> Result<(), NaviError> { Err(NaviError::Configuration(msg)) };

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "log_level '{}' must be one of {:?}",
                self.log_level, VALID_LOG_LEVELS
            ));
        }
        if let Some(priority) = self.priority {
            if !(-20..=19).contains(&priority) {
                return invalid(format!("priority {priority} must be within -20..=19"));
            }
        }

        if self.source.reconnect_backoff_ms == 0 {
            return invalid("source.reconnect_backoff_ms must be positive".into());
        }
        match self.source.kind {
            SourceKind::Logcat if self.source.command.trim().is_empty() => {
                return invalid("source.command must not be empty".into());
            }
            SourceKind::File if self.source.path.is_none() => {
                return invalid("source.path is required for the file source".into());
            }
            _ => {}
        }

        if self.speed.kind == SpeedKind::Udp && self.speed.udp_bind.parse::<SocketAddr>().is_err() {
            return invalid(format!("speed.udp_bind '{}' is not a socket address", self.speed.udp_bind));
        }
        if !self.speed.fixed_mps.is_finite() || self.speed.fixed_mps < 0.0 {
            return invalid("speed.fixed_mps must be a non-negative number".into());
        }

        if self.publish.sinks.is_empty() {
            return invalid("publish.sinks must name at least one sink".into());
        }
        if self.publish.sinks.contains(&SinkKind::File) && self.publish.path.is_none() {
            return invalid("publish.path is required for the file sink".into());
        }
        if self.publish.sinks.contains(&SinkKind::Udp) {
            match &self.publish.udp_target {
                Some(target) if target.parse::<SocketAddr>().is_ok() => {}
                Some(target) => {
                    return invalid(format!("publish.udp_target '{target}' is not a socket address"));
                }
                None => return invalid("publish.udp_target is required for the udp sink".into()),
            }
        }

        if self.engine.reconciler.flag_refresh_secs <= 0 {
            return invalid("engine.reconciler.flag_refresh_secs must be positive".into());
        }
        let v = &self.engine.visibility;
        for (name, value) in [
            ("moving_speed_mps", v.moving_speed_mps),
            ("stale_after_secs", v.stale_after_secs),
            ("min_remaining_secs", v.min_remaining_secs),
            ("min_display_secs", v.min_display_secs),
            ("min_event_distance_m", v.min_event_distance_m),
            ("speed_bump_lookahead_m", v.speed_bump_lookahead_m),
            ("initial_remaining_secs", v.initial_remaining_secs),
            ("section_enforcement_range_m", f64::from(v.section_enforcement_range_m)),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("engine.visibility.{name} must be a non-negative number"));
            }
        }

        Ok(())
    }
}
