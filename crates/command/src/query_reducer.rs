//! Query & load: the function handed to every command step.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use warden_core::RequestContext;
use warden_events::{AppendCondition, EventFilter, StoredEvent};
use warden_infra::{EventStore, with_deadline};

use crate::error::{CommandError, CommandResult};
use crate::write_model::WriteModel;

/// Answers a write model's query with the matching events in position order.
///
/// Implementations scope every query to `ctx.instance_id()`; callers never
/// choose the instance.
#[async_trait]
pub trait FilterToQueryReducer: Send + Sync {
    async fn filter(&self, ctx: &RequestContext, query: EventFilter) -> CommandResult<Vec<StoredEvent>>;
}

/// Query `wm` and fold the result into it.
pub async fn load_write_model<W>(
    ctx: &RequestContext,
    filter: &dyn FilterToQueryReducer,
    wm: &mut W,
) -> CommandResult<()>
where
    W: WriteModel + ?Sized,
{
    let events = filter.filter(ctx, wm.query()).await?;
    wm.reduce(&events)?;
    debug!(
        events = events.len(),
        processed_sequence = wm.base().processed_sequence,
        "write model loaded"
    );
    Ok(())
}

/// Loader backed by an [`EventStore`].
///
/// Every query it answers is remembered as an [`AppendCondition`] whose
/// watermark is the highest position returned, so the push that follows can be
/// rejected when a concurrent writer committed a relevant event.
pub struct StoreLoader<'s, S: ?Sized> {
    store: &'s S,
    conditions: Mutex<Vec<AppendCondition>>,
}

impl<'s, S: EventStore + ?Sized> StoreLoader<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            conditions: Mutex::new(Vec::new()),
        }
    }

    /// Conditions collected so far, in query order.
    pub fn into_conditions(self) -> CommandResult<Vec<AppendCondition>> {
        self.conditions
            .into_inner()
            .map_err(|_| CommandError::internal("loader conditions lock poisoned"))
    }
}

#[async_trait]
impl<S: EventStore + ?Sized> FilterToQueryReducer for StoreLoader<'_, S> {
    async fn filter(&self, ctx: &RequestContext, query: EventFilter) -> CommandResult<Vec<StoredEvent>> {
        let query = query.for_instance(ctx.instance_id().clone());
        let events = with_deadline(ctx.deadline(), self.store.filter(&query)).await?;

        let watermark = events.iter().map(|e| e.position).max().unwrap_or(0);
        self.conditions
            .lock()
            .map_err(|_| CommandError::internal("loader conditions lock poisoned"))?
            .push(AppendCondition::new(query, watermark));

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{InstanceId, UserId};
    use warden_events::{AggregateRef, PendingEvent};
    use warden_infra::{EventStoreError, InMemoryEventStore};

    fn org_added(id: &str, instance: &str) -> PendingEvent {
        PendingEvent {
            aggregate: AggregateRef::new("org", id, id, instance),
            event_type: "org.added".to_string(),
            payload: serde_json::json!({"name": id}),
            creator: UserId::new("u1"),
        }
    }

    #[tokio::test]
    async fn queries_are_scoped_to_the_request_instance() {
        let store = InMemoryEventStore::new();
        store.push(vec![org_added("o1", "inst1")], vec![]).await.unwrap();
        store.push(vec![org_added("o2", "inst2")], vec![]).await.unwrap();

        let loader = StoreLoader::new(&store);
        let ctx = RequestContext::new("inst2", "u1");
        let events = loader
            .filter(&ctx, EventFilter::new().aggregate_type("org"))
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate.id.as_str(), "o2");
    }

    #[tokio::test]
    async fn every_query_becomes_a_condition() {
        let store = InMemoryEventStore::new();
        store.push(vec![org_added("o1", "inst1")], vec![]).await.unwrap();
        store.push(vec![org_added("o2", "inst1")], vec![]).await.unwrap();

        let loader = StoreLoader::new(&store);
        let ctx = RequestContext::new("inst1", "u1");
        loader
            .filter(&ctx, EventFilter::new().aggregate_id("o1"))
            .await
            .unwrap();
        loader
            .filter(&ctx, EventFilter::new().aggregate_id("missing"))
            .await
            .unwrap();

        let conditions = loader.into_conditions().unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].after_position, 1);
        assert_eq!(
            conditions[0].filter.instance_id,
            Some(InstanceId::new("inst1"))
        );
        assert_eq!(conditions[1].after_position, 0);
    }

    #[tokio::test]
    async fn expired_context_fails_without_querying() {
        let store = InMemoryEventStore::new();
        let loader = StoreLoader::new(&store);
        let ctx = RequestContext::new("inst1", "u1").with_deadline(std::time::Instant::now());

        let err = loader.filter(&ctx, EventFilter::new()).await.unwrap_err();
        assert_eq!(err, CommandError::Store(EventStoreError::DeadlineExceeded));
    }
}
