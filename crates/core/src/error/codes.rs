use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the experimentation engine.
///
/// These map directly onto the error taxonomy the engine's callers rely on:
/// lookup misses are silent where the domain allows it, validation failures
/// are never retried, state conflicts name the conflicting entity, and
/// collaborator/storage failures are distinguished from genuine bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Optimization/product/shop/session-assignment lookup miss.
    NotFound,
    /// Malformed request: bad variant name, negative revenue, missing shop.
    InvalidArgument,
    /// Lifecycle guard failure: activating a non-draft optimization,
    /// deactivating a non-active one, a duplicate active optimization for
    /// the same (product, optimization_type).
    StateConflict,
    /// Webhook HMAC mismatch or stale signature timestamp.
    Unauthorized,
    /// The external catalog-mutation collaborator failed; the lifecycle
    /// transition that depended on it was left unchanged.
    CollaboratorFailure,
    /// A constraint violation the core itself should never produce.
    DataIntegrityError,
    /// Store timeout or connection loss; safe for the caller to retry.
    Transient,
    /// Uncategorized internal failure.
    InternalServerError,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::InvalidArgument => 400,
            ErrorCode::StateConflict => 409,
            ErrorCode::Unauthorized => 401,
            ErrorCode::CollaboratorFailure => 500,
            ErrorCode::DataIntegrityError => 500,
            ErrorCode::Transient => 503,
            ErrorCode::InternalServerError => 500,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "resource",
            ErrorCode::InvalidArgument => "validation",
            ErrorCode::StateConflict => "resource",
            ErrorCode::Unauthorized => "security",
            ErrorCode::CollaboratorFailure => "network",
            ErrorCode::DataIntegrityError => "database",
            ErrorCode::Transient => "database",
            ErrorCode::InternalServerError => "system",
        }
    }

    /// Whether a caller may safely retry a request that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Transient)
    }

    pub fn should_log_as_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::NotFound | ErrorCode::InvalidArgument | ErrorCode::StateConflict
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
