//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Classification of every failure the command side can report.
///
/// The transport boundary maps kinds to protocol statuses; this layer only
/// guarantees that each error has exactly one kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    PreconditionFailed,
    AlreadyExists,
    PermissionDenied,
    Internal,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Domain-level error.
///
/// Deterministic business failures detected either before any IO (malformed
/// input) or after inspecting reduced state. Store failures live in the infra
/// layer and are combined with these by the command engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced aggregate or sub-entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The aggregate exists but is in the wrong state for the transition.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Uniqueness violation.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The actor may not act on the target resource owner.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Infrastructure failure surfaced through a collaborator (e.g. ID generation).
    #[error("internal: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DomainError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            DomainError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            DomainError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DomainError::InvalidArgument(m)
            | DomainError::NotFound(m)
            | DomainError::PreconditionFailed(m)
            | DomainError::AlreadyExists(m)
            | DomainError::PermissionDenied(m)
            | DomainError::Internal(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_its_kind() {
        let cases = [
            (DomainError::invalid_argument("x"), ErrorKind::InvalidArgument),
            (DomainError::not_found("x"), ErrorKind::NotFound),
            (DomainError::precondition_failed("x"), ErrorKind::PreconditionFailed),
            (DomainError::already_exists("x"), ErrorKind::AlreadyExists),
            (DomainError::permission_denied("x"), ErrorKind::PermissionDenied),
            (DomainError::internal("x"), ErrorKind::Internal),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "x");
        }
    }

    #[test]
    fn display_includes_message() {
        let err = DomainError::not_found("key missing");
        assert_eq!(err.to_string(), "not found: key missing");
    }
}
