//! Error types and handling for kittydex-core operations.
//!
//! A single [`Error`] enum covers every failure in the harvest pipeline. The
//! variants map onto the pipeline's failure scopes:
//!
//! - **Run-fatal**: [`Error::InvalidConfig`], [`Error::Config`] abort a run
//!   before any worker starts
//! - **Worker-fatal**: [`Error::WorkerFatal`], [`Error::SessionLost`] end one
//!   worker while its siblings continue
//! - **Per-item**: [`Error::Fetch`], [`Error::Extract`], [`Error::Storage`] are
//!   caught at the worker boundary, logged with the record id, and skipped
//!
//! ## Recovery Hints
//!
//! ```rust
//! use kittydex_core::{Error, StorageError};
//!
//! let throttled = Error::Storage(StorageError::transient("7.json", "slow down"));
//! assert!(throttled.is_recoverable());
//! assert_eq!(throttled.category(), "storage");
//!
//! let denied = Error::Storage(StorageError::permanent("7.json", "access denied"));
//! assert!(!denied.is_recoverable());
//! ```

use thiserror::Error;

/// The main error type for kittydex-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invocation parameters cannot produce a valid run (e.g. zero workers).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration is malformed, inaccessible, or incomplete.
    ///
    /// ## Common Causes
    ///
    /// - Invalid TOML syntax in the config file
    /// - Production environment selected without credentials
    /// - Unknown environment name
    #[error("Configuration error: {0}")]
    Config(String),

    /// A storage backend call failed.
    ///
    /// Carries the backend's own view of whether the failure is transient.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Navigating to a record's page failed.
    ///
    /// Covers navigation timeouts, DNS failures and non-2xx document statuses.
    #[error("Fetch failed for '{url}': {reason}")]
    Fetch {
        /// Address that was being loaded.
        url: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The rendered page did not yield a well-formed record.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The rendering engine reported a failure that is not tied to one page.
    #[error("Render error: {0}")]
    Render(String),

    /// The rendering session is no longer usable.
    ///
    /// Raised when the browser process or its connection has gone away. The
    /// owning worker cannot make further progress and stops.
    #[error("Rendering session lost: {0}")]
    SessionLost(String),

    /// A worker terminated before exhausting its range.
    #[error("Worker {worker} died: {reason}")]
    WorkerFatal {
        /// Index of the worker that died.
        worker: usize,
        /// Reason for the termination.
        reason: String,
    },

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

/// Failure reported by a [`Storage`](crate::storage::Storage) backend.
///
/// `retryable` separates transient conditions (timeouts, throttling) from
/// permanent ones (bad credentials, missing bucket). The pipeline never retries
/// on its own; the flag is surfaced for logging and for callers that do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Storage error on '{key}': {message}")]
pub struct StorageError {
    /// Object key the operation targeted.
    pub key: String,
    /// Whether retrying the same call may succeed.
    pub retryable: bool,
    /// Backend-provided description.
    pub message: String,
}

impl StorageError {
    /// A failure that may succeed if retried.
    pub fn transient(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            retryable: true,
            message: message.into(),
        }
    }

    /// A failure that will not go away on retry.
    pub fn permanent(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            retryable: false,
            message: message.into(),
        }
    }
}

/// Why a rendered page could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// One of the structural anchors (owner, generation, gene list) is absent.
    #[error("missing anchor '{anchor}'")]
    MissingAnchor {
        /// Name of the anchor that was not found.
        anchor: &'static str,
    },

    /// The gene list exists but does not form a valid genome.
    #[error("malformed genome: {0}")]
    MalformedGenome(String),

    /// The DOM query returned something other than the expected object.
    #[error("unexpected DOM query result: {0}")]
    UnexpectedShape(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for transient storage failures, fetch failures and
    /// timeouts. Configuration, extraction and worker-level failures are
    /// permanent for the current run.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(e) => e.retryable,
            Self::Fetch { .. } | Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Whether this error ends the worker that hit it rather than one item.
    #[must_use]
    pub const fn is_worker_fatal(&self) -> bool {
        matches!(self, Self::SessionLost(_) | Self::WorkerFatal { .. })
    }

    /// Get the error category as a string identifier for structured logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::InvalidConfig(_) | Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Fetch { .. } => "fetch",
            Self::Extract(_) => "extract",
            Self::Render(_) | Self::SessionLost(_) => "render",
            Self::WorkerFatal { .. } => "worker",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_storage_error_display_includes_key() {
        let err = Error::from(StorageError::transient("42.json", "throttled"));
        let text = err.to_string();
        assert!(text.contains("42.json"));
        assert!(text.contains("throttled"));
    }

    #[test]
    fn test_recoverability() {
        let recoverable = vec![
            Error::Storage(StorageError::transient("1.json", "timeout")),
            Error::Fetch {
                url: "https://example.com/1".to_string(),
                reason: "net::ERR_TIMED_OUT".to_string(),
            },
            Error::Timeout("network idle".to_string()),
            Error::Io(io::Error::new(io::ErrorKind::Interrupted, "interrupted")),
        ];
        let permanent = vec![
            Error::Storage(StorageError::permanent("1.json", "denied")),
            Error::Extract(ExtractError::MissingAnchor { anchor: "owner" }),
            Error::InvalidConfig("zero workers".to_string()),
            Error::SessionLost("browser exited".to_string()),
            Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
        ];

        for err in recoverable {
            assert!(err.is_recoverable(), "{err} should be recoverable");
        }
        for err in permanent {
            assert!(!err.is_recoverable(), "{err} should be permanent");
        }
    }

    #[test]
    fn test_worker_fatal_classification() {
        assert!(Error::SessionLost("gone".into()).is_worker_fatal());
        assert!(
            Error::WorkerFatal {
                worker: 2,
                reason: "launch failed".into()
            }
            .is_worker_fatal()
        );
        assert!(!Error::Extract(ExtractError::MalformedGenome("x".into())).is_worker_fatal());
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::InvalidConfig(String::new()).category(), "config");
        assert_eq!(
            Error::Extract(ExtractError::UnexpectedShape(String::new())).category(),
            "extract"
        );
        assert_eq!(Error::SessionLost(String::new()).category(), "render");
        assert_eq!(Error::Other(String::new()).category(), "other");
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        match Error::from(parse_err) {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            other => panic!("expected serialization error, got {other:?}"),
        }
    }
}
