//! Strongly-typed identifiers and the ID generator collaborator.

use core::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Identifier of an instance (the multi-tenant boundary).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

/// Identifier of an aggregate stream (organisation, user, target, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

/// Owner of an aggregate (usually an organisation id, or the instance id for
/// instance-level resources).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceOwner(String);

/// Identifier of a user, also used as the acting principal on events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

macro_rules! impl_string_id {
    ($t:ty) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_id!(InstanceId);
impl_string_id!(AggregateId);
impl_string_id!(ResourceOwner);
impl_string_id!(UserId);

impl From<&AggregateId> for ResourceOwner {
    /// Organisations own themselves.
    fn from(value: &AggregateId) -> Self {
        Self(value.0.clone())
    }
}

impl From<&UserId> for AggregateId {
    fn from(value: &UserId) -> Self {
        Self(value.0.clone())
    }
}

impl From<&AggregateId> for UserId {
    fn from(value: &AggregateId) -> Self {
        Self(value.0.clone())
    }
}

/// Produces globally unique identifiers for new aggregates and sub-entities
/// (keys, tokens, codes).
///
/// Implementations must be safe to call concurrently. No ordering guarantee is
/// required.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> DomainResult<String>;
}

/// UUIDv7 (time-ordered) generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> DomainResult<String> {
        Ok(Uuid::now_v7().simple().to_string())
    }
}

/// Deterministic generator: `prefix` followed by an increasing counter.
///
/// Prefer this in tests so assertions can name the IDs that will be handed out.
#[derive(Debug)]
pub struct SequenceIdGenerator {
    prefix: String,
    next: AtomicU64,
    limit: Option<u64>,
}

impl SequenceIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
            limit: None,
        }
    }

    /// Fail once `limit` IDs have been handed out.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self) -> DomainResult<String> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        if let Some(limit) = self.limit {
            if n > limit {
                return Err(DomainError::internal("id generator exhausted"));
            }
        }
        Ok(format!("{}{}", self.prefix, n))
    }
}

impl<G> IdGenerator for std::sync::Arc<G>
where
    G: IdGenerator + ?Sized,
{
    fn next_id(&self) -> DomainResult<String> {
        (**self).next_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_generator_is_deterministic() {
        let ids = SequenceIdGenerator::new("key-");
        assert_eq!(ids.next_id().unwrap(), "key-1");
        assert_eq!(ids.next_id().unwrap(), "key-2");
    }

    #[test]
    fn sequence_generator_respects_limit() {
        let ids = SequenceIdGenerator::new("id").with_limit(1);
        assert!(ids.next_id().is_ok());
        let err = ids.next_id().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }

    #[test]
    fn uuid_generator_yields_unique_ids() {
        let first = UuidGenerator.next_id().unwrap();
        let second = UuidGenerator.next_id().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn empty_ids_are_detected() {
        assert!(AggregateId::new("  ").is_empty());
        assert!(!AggregateId::new("a").is_empty());
    }
}
