//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, permission checks). Infrastructure concerns belong elsewhere.
/// Every variant carries a stable machine code (`code()`) so callers can map
/// failures without parsing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive amount, malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested account/card/membership does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The actor's role lacks the required capability, or an access code
    /// check failed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Balance or spending-limit breach; the operation was rejected before
    /// any mutation.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Operation attempted against a non-ACTIVE target or an expired/foreign
    /// invite token.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Duplicate membership or generated-identifier collision.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic-concurrency conflict (stale version); retry the whole
    /// operation.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::InsufficientFunds(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Stable machine-readable code for API/error-body mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::InvalidState(_) => "invalid_state",
            Self::AlreadyExists(_) => "already_exists",
            Self::Conflict(_) => "conflict",
        }
    }
}
