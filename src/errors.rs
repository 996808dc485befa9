// Error taxonomy for AuthMatrix

use thiserror::Error;

/// Role-management and run-lifecycle errors surfaced synchronously to callers.
/// None of these change store state when returned.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("role '{0}' already exists")]
    DuplicateRole(String),

    #[error("no such role: '{0}'")]
    UnknownRole(String),

    #[error("role '{0}' is the current baseline and cannot be deleted")]
    BaselineProtected(String),

    #[error("replay preconditions not met: {0}")]
    Precondition(String),

    #[error("a replay run is already active")]
    RunActive,

    #[error("invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Opaque per-request transport failure (timeout, reset, TLS, ...).
/// Recovered locally as an ERROR verdict, never aborts a run.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}
