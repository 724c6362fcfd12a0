//! Error types for the Settee engine.

use thiserror::Error;

/// All possible errors from the Settee engine and its drivers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("not found: {0}")]
    NotFound(String),

    // Write errors
    #[error("document update conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    // Access errors
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    // Wiring errors
    #[error("unknown driver {0:?} (forgotten registration?)")]
    DriverNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn missing() -> Self {
        Error::NotFound("missing".into())
    }

    pub(crate) fn deleted() -> Self {
        Error::NotFound("deleted".into())
    }

    pub(crate) fn conflict() -> Self {
        Error::Conflict("document update conflict".into())
    }

    /// True if the error reports an absent optional capability.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Error::NotImplemented(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
