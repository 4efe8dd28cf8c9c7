//! Error types for tokrate-core
//!
//! Two layers of failure exist in a run:
//!
//! - [`ErrorKind`] classifies a single failed request. It is carried as data
//!   inside a [`RequestRecord`](crate::record::RequestRecord) and never
//!   escapes the worker that produced it.
//! - [`BenchError`] is a setup or orchestration fault that prevents a run from
//!   starting or continuing at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport could not be established or broke mid-stream
    ConnectionError,
    /// Malformed or unexpected response from the endpoint
    ProtocolError,
    /// The endpoint rejected the credential
    AuthError,
    /// No terminal signal within the configured duration
    Timeout,
}

impl ErrorKind {
    /// Stable identifier used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::Timeout => "timeout",
        }
    }

    /// All kinds, in report order
    pub fn all() -> &'static [ErrorKind] {
        &[
            ErrorKind::ConnectionError,
            ErrorKind::ProtocolError,
            ErrorKind::AuthError,
            ErrorKind::Timeout,
        ]
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a fatal benchmark error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchErrorKind {
    /// Run configuration is invalid
    Config,
    /// A required builder field was never set
    MissingConfig,
    /// Level coordination broke down
    Orchestration,
}

impl std::fmt::Display for BenchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchErrorKind::Config => write!(f, "configuration error"),
            BenchErrorKind::MissingConfig => write!(f, "missing configuration"),
            BenchErrorKind::Orchestration => write!(f, "orchestration error"),
        }
    }
}

/// Fatal error that stops a run before or between levels
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct BenchError {
    /// Error category
    pub kind: BenchErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl BenchError {
    /// Invalid run configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: BenchErrorKind::Config,
            message: message.into(),
        }
    }

    /// A builder was finalized without a required field
    pub fn missing_config(field: &str) -> Self {
        Self {
            kind: BenchErrorKind::MissingConfig,
            message: format!("required field `{}` was not set", field),
        }
    }

    /// Coordination fault
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self {
            kind: BenchErrorKind::Orchestration,
            message: message.into(),
        }
    }
}

/// Result type alias for fallible core operations
pub type BenchResult<T> = std::result::Result<T, BenchError>;
