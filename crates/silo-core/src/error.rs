//! Error taxonomy for the ingestion pipeline.
//!
//! Every failure anywhere in the pipeline is classified into one of the
//! kinds below. Only [`SiloError::Transient`] failures are ever retried;
//! everything else is recorded against the file and the run continues.

use thiserror::Error;

/// Substrings that mark a storage or extractor failure as retryable.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection",
    "timeout",
    "locked",
    "busy",
    "deadlock",
    "network",
    "temporary",
];

/// Error kinds, independent of the carried payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Extension has no registered extractor.
    UnsupportedType,
    /// A backend library is unavailable.
    MissingDependency,
    /// Hash uncomputable or a sentinel value.
    InvalidHash,
    /// Extractor returned a structurally invalid payload.
    InvalidData,
    /// Per-task deadline exceeded.
    Timeout,
    /// Retryable failure (connection loss, lock contention, ...).
    Transient,
    /// Non-retryable storage or extractor failure.
    Permanent,
    /// Container nesting above the recursion limit.
    MaxDepthExceeded,
    /// Unhandled error inside a worker.
    Internal,
}

/// Pipeline-wide error type.
///
/// The variants mirror [`ErrorKind`] one to one; the payload carries the
/// human-readable detail that ends up in the action log and in the
/// per-file error content.
#[derive(Error, Debug, Clone)]
pub enum SiloError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("missing backend dependency: {0}")]
    MissingDependency(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("task timed out after {0}s")]
    Timeout(u64),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("{0}")]
    Permanent(String),

    #[error("container nesting exceeds maximum depth {0}")]
    MaxDepthExceeded(usize),

    #[error("internal worker error: {0}")]
    Internal(String),
}

impl SiloError {
    /// Kind of this error, for statistics and dispatch decisions.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedType(_) => ErrorKind::UnsupportedType,
            Self::MissingDependency(_) => ErrorKind::MissingDependency,
            Self::InvalidHash(_) => ErrorKind::InvalidHash,
            Self::InvalidData(_) => ErrorKind::InvalidData,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Permanent(_) => ErrorKind::Permanent,
            Self::MaxDepthExceeded(_) => ErrorKind::MaxDepthExceeded,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the error should be retried with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a failure message as transient or permanent.
    ///
    /// The marker list matches the retry policy of the storage layer:
    /// lock contention, connection loss and other self-healing conditions
    /// are retried, everything else fails immediately.
    #[must_use]
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }
}

impl From<std::io::Error> for SiloError {
    fn from(err: std::io::Error) -> Self {
        Self::classify(err.to_string())
    }
}
