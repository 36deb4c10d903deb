//! Inbound log records.

use serde::{Deserialize, Serialize};

use crate::clock::log_timestamp_to_millis;

/// One record delivered by the log source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Source-defined monotonic identifier.
    pub id: u64,
    /// Timestamp, whole seconds.
    pub sec: i64,
    /// Timestamp, nanoseconds within the second.
    pub nsec: i64,
    /// Emitting process id (diagnostics only).
    pub pid: i32,
    /// Emitting thread id (diagnostics only).
    pub tid: i32,
    /// Log priority letter (`V`, `D`, `I`, `W`, `E`, `F`).
    pub priority: char,
    /// Log tag.
    pub tag: String,
    /// Message body.
    pub message: String,
}

impl LogRecord {
    /// Convenience constructor for a record with no process metadata.
    pub fn new(
        id: u64,
        sec: i64,
        nsec: i64,
        tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            sec,
            nsec,
            pid: 0,
            tid: 0,
            priority: 'I',
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Record timestamp in milliseconds.
    pub fn timestamp_millis(&self) -> i64 {
        log_timestamp_to_millis(self.sec, self.nsec)
    }

    /// Record timestamp in seconds, millisecond resolution.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_millis() as f64 * 0.001
    }
}
