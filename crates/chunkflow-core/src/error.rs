use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable, machine-checkable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Invalid,
    FailedPrecondition,
    Unimplemented,
    NotFound,
    OutOfRange,
    ResourceExhausted,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Bad configuration, e.g. a non-positive period.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Schema or ordering violation discovered while processing.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Column type not supported by an algorithm.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("internal invariant failed: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Invalid(_) => ErrorKind::Invalid,
            Error::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Error::Unimplemented(_) => ErrorKind::Unimplemented,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::OutOfRange(_) => ErrorKind::OutOfRange,
            Error::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The human-readable part without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Invalid(m)
            | Error::FailedPrecondition(m)
            | Error::Unimplemented(m)
            | Error::NotFound(m)
            | Error::OutOfRange(m)
            | Error::ResourceExhausted(m)
            | Error::Internal(m) => m,
        }
    }

    pub fn schema_collision(label: &str, was: impl std::fmt::Display, now: impl std::fmt::Display) -> Self {
        Error::FailedPrecondition(format!(
            "schema collision detected: column \"{label}\" is both of type {was} and {now}"
        ))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Invalid(e.to_string())
    }
}
