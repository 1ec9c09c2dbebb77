use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use warden_core::{AggregateId, InstanceId, ResourceOwner};
use warden_events::{AppendCondition, EventFilter, PendingEvent, StoredEvent, TenantScoped};

use super::r#trait::{EventStore, EventStoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    instance_id: InstanceId,
    aggregate_type: String,
    aggregate_id: AggregateId,
}

impl StreamKey {
    fn of(event: &PendingEvent) -> Self {
        Self {
            instance_id: event.aggregate.instance_id.clone(),
            aggregate_type: event.aggregate.aggregate_type.clone(),
            aggregate_id: event.aggregate.id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct StreamHead {
    sequence: u64,
    resource_owner: ResourceOwner,
}

#[derive(Debug, Default)]
struct Log {
    events: Vec<StoredEvent>,
    heads: HashMap<StreamKey, StreamHead>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. One global log ordered by position; every push is
/// checked and applied under a single write lock, which makes multi-aggregate
/// batches atomic.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed events across all instances.
    pub fn len(&self) -> usize {
        self.log.read().map(|log| log.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> EventStoreError {
    EventStoreError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip_all, fields(instance = ?filter.instance_id), err)]
    async fn filter(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, EventStoreError> {
        if filter.instance_id.as_ref().is_none_or(|i| i.is_empty()) {
            return Err(EventStoreError::TenantIsolation(
                "filter is not scoped to an instance".to_string(),
            ));
        }

        let log = self.log.read().map_err(|_| poisoned())?;
        let events: Vec<StoredEvent> = log
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        debug!(matched = events.len(), "filtered events");
        Ok(events)
    }

    #[instrument(skip_all, fields(events = events.len(), conditions = conditions.len()), err)]
    async fn push(
        &self,
        events: Vec<PendingEvent>,
        conditions: Vec<AppendCondition>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let instance_id = events[0].instance_id().clone();
        if instance_id.is_empty() {
            return Err(EventStoreError::TenantIsolation(
                "event is not scoped to an instance".to_string(),
            ));
        }
        for (idx, e) in events.iter().enumerate() {
            if !e.belongs_to(&instance_id) {
                return Err(EventStoreError::TenantIsolation(format!(
                    "batch contains multiple instances (index {idx})"
                )));
            }
            if e.aggregate.id.is_empty() || e.aggregate.aggregate_type.is_empty() {
                return Err(EventStoreError::InvalidAppend(format!(
                    "event without aggregate (index {idx})"
                )));
            }
        }

        let mut log = self.log.write().map_err(|_| poisoned())?;

        for condition in &conditions {
            if let Some(conflict) = log.events.iter().rev().find(|e| condition.is_violated_by(e)) {
                return Err(EventStoreError::Concurrency(format!(
                    "'{}' on {} {} committed at position {} after {}",
                    conflict.event_type,
                    conflict.aggregate.aggregate_type,
                    conflict.aggregate.id,
                    conflict.position,
                    condition.after_position
                )));
            }
        }

        // Stage sequence numbers first so a rejected batch leaves no trace.
        let mut staged: HashMap<StreamKey, StreamHead> = HashMap::new();
        let mut sequences = Vec::with_capacity(events.len());
        for (idx, e) in events.iter().enumerate() {
            let key = StreamKey::of(e);
            let head = match staged.get(&key) {
                Some(head) => head.clone(),
                None => log.heads.get(&key).cloned().unwrap_or_else(|| StreamHead {
                    sequence: 0,
                    resource_owner: e.aggregate.resource_owner.clone(),
                }),
            };
            if head.resource_owner != e.aggregate.resource_owner {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} {} is owned by '{}', attempted append as '{}' (index {idx})",
                    key.aggregate_type, key.aggregate_id, head.resource_owner, e.aggregate.resource_owner
                )));
            }
            let next = StreamHead {
                sequence: head.sequence + 1,
                resource_owner: head.resource_owner,
            };
            sequences.push(next.sequence);
            staged.insert(key, next);
        }

        let created_at = Utc::now();
        let mut position = log.events.last().map(|e| e.position).unwrap_or(0);
        let mut committed = Vec::with_capacity(events.len());
        for (e, sequence) in events.into_iter().zip(sequences) {
            position += 1;
            let stored = StoredEvent {
                aggregate: e.aggregate,
                sequence,
                position,
                event_type: e.event_type,
                payload: e.payload,
                created_at,
                creator: e.creator,
            };
            log.events.push(stored.clone());
            committed.push(stored);
        }
        log.heads.extend(staged);

        debug!(last_position = position, "pushed events");
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::UserId;
    use warden_events::AggregateRef;

    fn pending(aggregate_type: &str, id: &str, owner: &str, instance: &str, event_type: &str) -> PendingEvent {
        PendingEvent {
            aggregate: AggregateRef::new(aggregate_type, id, owner, instance),
            event_type: event_type.to_string(),
            payload: serde_json::json!({}),
            creator: UserId::new("u1"),
        }
    }

    fn scoped(instance: &str) -> EventFilter {
        EventFilter::new().for_instance(InstanceId::new(instance))
    }

    #[tokio::test]
    async fn push_assigns_sequence_per_stream_and_global_position() {
        let store = InMemoryEventStore::new();
        let committed = store
            .push(
                vec![
                    pending("org", "o1", "o1", "inst1", "org.added"),
                    pending("user", "u1", "o1", "inst1", "user.human.added"),
                    pending("org", "o1", "o1", "inst1", "org.member.added"),
                ],
                vec![],
            )
            .await
            .unwrap();

        let seq: Vec<_> = committed.iter().map(|e| (e.sequence, e.position)).collect();
        assert_eq!(seq, vec![(1, 1), (1, 2), (2, 3)]);
        assert!(committed.iter().all(|e| e.created_at == committed[0].created_at));
    }

    #[tokio::test]
    async fn filter_requires_instance_scope() {
        let store = InMemoryEventStore::new();
        let err = store.filter(&EventFilter::new()).await.unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[tokio::test]
    async fn filter_never_crosses_instances() {
        let store = InMemoryEventStore::new();
        store
            .push(vec![pending("org", "o1", "o1", "inst1", "org.added")], vec![])
            .await
            .unwrap();
        store
            .push(vec![pending("org", "o1", "o1", "inst2", "org.added")], vec![])
            .await
            .unwrap();

        let events = store.filter(&scoped("inst1")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate.instance_id.as_str(), "inst1");
    }

    #[tokio::test]
    async fn violated_condition_rejects_whole_batch() {
        let store = InMemoryEventStore::new();
        store
            .push(vec![pending("org", "o1", "o1", "inst1", "org.added")], vec![])
            .await
            .unwrap();

        let condition = AppendCondition::new(scoped("inst1").aggregate_id("o1"), 0);
        let err = store
            .push(
                vec![
                    pending("org", "o1", "o1", "inst1", "org.domain.added"),
                    pending("user", "u9", "o1", "inst1", "user.human.added"),
                ],
                vec![condition],
            )
            .await
            .unwrap_err();

        assert!(err.is_concurrency());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn satisfied_condition_allows_push() {
        let store = InMemoryEventStore::new();
        store
            .push(vec![pending("org", "o1", "o1", "inst1", "org.added")], vec![])
            .await
            .unwrap();

        // Unrelated streams do not invalidate the condition.
        store
            .push(vec![pending("org", "o2", "o2", "inst1", "org.added")], vec![])
            .await
            .unwrap();

        let condition = AppendCondition::new(scoped("inst1").aggregate_id("o1"), 1);
        let committed = store
            .push(vec![pending("org", "o1", "o1", "inst1", "org.removed")], vec![condition])
            .await
            .unwrap();
        assert_eq!(committed[0].sequence, 2);
        assert_eq!(committed[0].position, 3);
    }

    #[tokio::test]
    async fn resource_owner_is_fixed_by_first_event() {
        let store = InMemoryEventStore::new();
        store
            .push(vec![pending("org", "o1", "o1", "inst1", "org.added")], vec![])
            .await
            .unwrap();

        let err = store
            .push(vec![pending("org", "o1", "other", "inst1", "org.removed")], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
    }

    #[tokio::test]
    async fn mixed_instance_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let err = store
            .push(
                vec![
                    pending("org", "o1", "o1", "inst1", "org.added"),
                    pending("org", "o2", "o2", "inst2", "org.added"),
                ],
                vec![],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_push_is_a_no_op() {
        let store = InMemoryEventStore::new();
        assert_eq!(store.push(vec![], vec![]).await.unwrap(), vec![]);
        assert!(store.is_empty());
    }
}
