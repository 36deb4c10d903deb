//! Error types for the navigation relay.
//!
//! The reconciliation core itself never fails: degenerate inputs produce degenerate
//! but defined numbers. Errors only arise at collaborator boundaries (log source,
//! flag store, publisher, configuration), and only an unopenable log source is fatal.

use thiserror::Error;

/// Convenience alias for results using [`NaviError`].
pub type NaviResult<T> = std::result::Result<T, NaviError>;

/// Errors raised by the relay's collaborators.
#[derive(Error, Debug)]
pub enum NaviError {
    /// The log source could not be opened at all. Unrecoverable.
    #[error("Failed to open log source '{source_name}': {message}")]
    SourceUnavailable {
        /// Source description (command line or path).
        source_name: String,
        /// Underlying reason.
        message: String,
    },

    /// A single log line could not be parsed into a record.
    #[error("Malformed log record: {0}")]
    MalformedRecord(String),

    /// Feature flag store read failed.
    #[error("Flag store error for '{key}': {message}")]
    FlagStore {
        /// Flag key.
        key: String,
        /// Underlying reason.
        message: String,
    },

    /// Publishing a message failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Configuration parsed but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NaviError {
    /// Whether the service loop can absorb this error and continue.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            NaviError::SourceUnavailable { .. } | NaviError::Configuration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        let fatal = NaviError::SourceUnavailable {
            source_name: "logcat".into(),
            message: "not found".into(),
        };
        assert!(!fatal.is_recoverable());
        assert!(NaviError::MalformedRecord("x".into()).is_recoverable());
        assert!(NaviError::Publish("closed".into()).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = NaviError::FlagStore {
            key: "OpkrMapEnable".into(),
            message: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "Flag store error for 'OpkrMapEnable': permission denied"
        );
    }
}
