//! Error type returned by every command entry point.

use thiserror::Error;

use warden_core::{DomainError, ErrorKind};
use warden_events::PayloadError;
use warden_infra::EventStoreError;

pub type CommandResult<T> = Result<T, CommandError>;

/// A command failure: business rule, store or payload.
///
/// Errors pass through pipelines unchanged, so a caller always sees the error
/// of the step that failed first. Use [`CommandError::kind`] to classify.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl CommandError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        DomainError::invalid_argument(msg).into()
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DomainError::not_found(msg).into()
    }

    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        DomainError::precondition_failed(msg).into()
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        DomainError::already_exists(msg).into()
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        DomainError::permission_denied(msg).into()
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DomainError::internal(msg).into()
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Domain(e) => e.kind(),
            CommandError::Store(EventStoreError::TenantIsolation(_)) => ErrorKind::PermissionDenied,
            CommandError::Store(_) => ErrorKind::Internal,
            CommandError::Payload(_) => ErrorKind::Internal,
        }
    }

    /// Only an optimistic-concurrency rejection may be retried, and only after
    /// reloading and revalidating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommandError::Store(e) if e.is_concurrency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_internal_except_isolation() {
        let conflict: CommandError = EventStoreError::Concurrency("x".into()).into();
        assert_eq!(conflict.kind(), ErrorKind::Internal);
        assert!(conflict.is_retryable());

        let deadline: CommandError = EventStoreError::DeadlineExceeded.into();
        assert_eq!(deadline.kind(), ErrorKind::Internal);
        assert!(!deadline.is_retryable());

        let isolation: CommandError = EventStoreError::TenantIsolation("x".into()).into();
        assert_eq!(isolation.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        assert_eq!(CommandError::not_found("key").kind(), ErrorKind::NotFound);
        assert_eq!(
            CommandError::already_exists("domain").kind(),
            ErrorKind::AlreadyExists
        );
        assert!(!CommandError::precondition_failed("active").is_retryable());
    }

    #[test]
    fn payload_errors_are_internal() {
        let err: CommandError = PayloadError::new("org.added", "bad").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
