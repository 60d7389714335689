//! Error types for the odr-mgmt crate.
//!
//! This module provides a unified error type for every management protocol
//! operation. Variants map onto the failure categories operators care about:
//! an unreachable daemon, the wrong daemon, a daemon that does not answer, and
//! a daemon that answers with something we cannot decode.

use std::time::Duration;

/// Unified error type for management protocol operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("Expected service '{expected}', but the endpoint is '{found}'")]
    ProtocolMismatch { expected: String, found: String },

    #[error("No reply to '{command}' within {} ms", timeout.as_millis())]
    Timeout { command: String, timeout: Duration },

    #[error("Malformed reply to '{command}': {reason}")]
    MalformedReply { command: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("A transaction is already pending on this session")]
    TransactionPending,

    #[error("No transaction is pending on this session")]
    NothingPending,

    #[error("Session is unusable: {0}")]
    SessionUnusable(&'static str),

    #[error("Session has not been verified by a handshake or ping")]
    NotVerified,

    #[error("Configuration has no '{0}' section")]
    MissingSection(String),

    #[error("Remote control rejected {module}.{parameter}: {message}")]
    RcRejected {
        module: String,
        parameter: String,
        message: String,
    },

    #[error("Unexpected ping reply: {0}")]
    PingFailed(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl Error {
    pub fn malformed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedReply {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error ends the usefulness of the session it occurred on.
    ///
    /// Timeouts, malformed replies and per-call rejections leave the session
    /// usable for a new, explicit transaction.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ProtocolMismatch { .. }
                | Self::Transport(_)
                | Self::Io(_)
                | Self::SessionUnusable(_)
                | Self::PingFailed(_)
        )
    }
}

impl From<zeromq::ZmqError> for Error {
    fn from(e: zeromq::ZmqError) -> Self {
        Self::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_malformed_factory() {
        let err = Error::malformed("values", "missing 'values'");
        match err {
            Error::MalformedReply { command, reason } => {
                assert_eq!(command, "values");
                assert_eq!(reason, "missing 'values'");
            }
            _ => panic!("Expected MalformedReply"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = Error::Timeout {
            command: "values".to_string(),
            timeout: Duration::from_millis(1000),
        };
        assert_eq!(err.to_string(), "No reply to 'values' within 1000 ms");

        let err = Error::ProtocolMismatch {
            expected: "ODR-DabMux".to_string(),
            found: "Other-Product v1".to_string(),
        };
        assert!(err.to_string().contains("ODR-DabMux"));
        assert!(err.to_string().contains("Other-Product v1"));

        let err = Error::TransactionPending;
        assert_eq!(
            err.to_string(),
            "A transaction is already pending on this session"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(
            Error::Connect {
                endpoint: "tcp://localhost:12720".to_string(),
                message: "refused".to_string(),
            }
            .is_fatal()
        );
        assert!(
            Error::ProtocolMismatch {
                expected: "a".to_string(),
                found: "b".to_string(),
            }
            .is_fatal()
        );
        assert!(Error::Transport("reset".to_string()).is_fatal());
        assert!(Error::PingFailed("nope".to_string()).is_fatal());

        assert!(
            !Error::Timeout {
                command: "values".to_string(),
                timeout: Duration::from_secs(1),
            }
            .is_fatal()
        );
        assert!(!Error::malformed("config", "bad json").is_fatal());
        assert!(!Error::MissingSection("services".to_string()).is_fatal());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("pipe broken"));
    }

    #[test]
    fn test_error_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_error() -> Result<i32> {
            Err(Error::TransactionPending)
        }

        assert!(matches!(returns_error(), Err(Error::TransactionPending)));
    }
}
