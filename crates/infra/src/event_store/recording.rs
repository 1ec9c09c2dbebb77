use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use warden_events::{AppendCondition, EventFilter, PendingEvent, StoredEvent};

use super::r#trait::{EventStore, EventStoreError};

/// Store decorator that counts calls and keeps every attempted push.
///
/// Used by tests asserting that a command never reached the store, or that it
/// pushed exactly one batch.
#[derive(Debug, Default)]
pub struct RecordingEventStore<S> {
    inner: S,
    filter_calls: AtomicUsize,
    push_calls: AtomicUsize,
    pushed: Mutex<Vec<Vec<PendingEvent>>>,
}

impl<S> RecordingEventStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            filter_calls: AtomicUsize::new(0),
            push_calls: AtomicUsize::new(0),
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// Every batch handed to `push`, accepted or not.
    pub fn pushed(&self) -> Vec<Vec<PendingEvent>> {
        self.pushed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// True when the store saw neither a query nor a push.
    pub fn untouched(&self) -> bool {
        self.filter_calls() == 0 && self.push_calls() == 0
    }
}

#[async_trait]
impl<S: EventStore> EventStore for RecordingEventStore<S> {
    async fn filter(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.filter(filter).await
    }

    async fn push(
        &self,
        events: Vec<PendingEvent>,
        conditions: Vec<AppendCondition>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut pushed) = self.pushed.lock() {
            pushed.push(events.clone());
        }
        self.inner.push(events, conditions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryEventStore;
    use warden_core::{InstanceId, UserId};
    use warden_events::AggregateRef;

    #[tokio::test]
    async fn counts_calls_and_records_batches() {
        let store = RecordingEventStore::new(InMemoryEventStore::new());
        assert!(store.untouched());

        let event = PendingEvent {
            aggregate: AggregateRef::new("org", "o1", "o1", "inst1"),
            event_type: "org.added".to_string(),
            payload: serde_json::json!({"name": "acme"}),
            creator: UserId::new("u1"),
        };
        store.push(vec![event.clone()], vec![]).await.unwrap();
        store
            .filter(&EventFilter::new().for_instance(InstanceId::new("inst1")))
            .await
            .unwrap();

        assert_eq!(store.push_calls(), 1);
        assert_eq!(store.filter_calls(), 1);
        assert_eq!(store.pushed(), vec![vec![event]]);
        assert_eq!(store.inner().len(), 1);
    }
}
