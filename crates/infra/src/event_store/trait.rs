use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use warden_events::{AppendCondition, EventFilter, PendingEvent, StoredEvent};

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) as
/// opposed to domain errors. A `Concurrency` rejection is retryable by
/// reloading and revalidating; every other variant is not.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    /// A push precondition failed: another writer committed a relevant event.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A query or batch did not respect the instance boundary.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// The batch is malformed or contradicts the stream (e.g. owner change).
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// The caller's deadline elapsed before the store answered.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The backend could not serve the request (network, poisoned lock, ...).
    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

impl EventStoreError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, EventStoreError::Concurrency(_))
    }
}

/// Append-only, tenant-scoped event store.
///
/// ## Filter semantics
///
/// `filter()` returns every committed event matching the filter, ordered by
/// ascending global position (which implies ascending sequence within each
/// aggregate). It never returns duplicates or partial matches and rejects
/// filters that are not scoped to an instance.
///
/// ## Push semantics
///
/// `push()`:
/// - checks every [`AppendCondition`] (optimistic concurrency)
/// - keeps each stream's resource owner fixed by its first event
/// - assigns per-stream sequences, global positions and the creation date
/// - persists the whole batch atomically (all or nothing), across any number
///   of aggregates
///
/// It returns the committed events in batch order.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn filter(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, EventStoreError>;

    async fn push(
        &self,
        events: Vec<PendingEvent>,
        conditions: Vec<AppendCondition>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

#[async_trait]
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    async fn filter(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).filter(filter).await
    }

    async fn push(
        &self,
        events: Vec<PendingEvent>,
        conditions: Vec<AppendCondition>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).push(events, conditions).await
    }
}
