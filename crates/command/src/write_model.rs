//! Write models: per-command state folded from the event log.
//!
//! A write model holds only what one command needs to validate. It is built
//! fresh for every invocation, loaded once through a
//! [`FilterToQueryReducer`](crate::FilterToQueryReducer), optionally extended
//! by [`push_and_sync`](crate::push_and_sync), then dropped.

use chrono::{DateTime, Utc};

use warden_core::{AggregateId, InstanceId, ObjectDetails, ResourceOwner};
use warden_events::{EventFilter, PayloadError, StoredEvent};

/// State folded from events.
///
/// `query` must select exactly the event types `reduce` recognises; events of
/// other types are ignored and leave the model unchanged. `reduce` receives
/// events in ascending position order, each exactly once.
pub trait WriteModel: Send {
    fn query(&self) -> EventFilter;

    /// Pure fold. Fails only when a recognised event's payload cannot be
    /// decoded; business rules are checked by the caller afterwards.
    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError>;

    fn base(&self) -> &WriteModelBase;
}

/// Bookkeeping shared by every write model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteModelBase {
    pub aggregate_id: AggregateId,
    pub resource_owner: ResourceOwner,
    pub instance_id: InstanceId,
    /// Sequence of the last committed event reduced.
    pub processed_sequence: u64,
    /// Global position of the last committed event reduced; the watermark of
    /// the optimistic-concurrency check in [`push_and_sync`](crate::push_and_sync).
    pub processed_position: u64,
    pub change_date: Option<DateTime<Utc>>,
}

impl WriteModelBase {
    pub fn new(aggregate_id: impl Into<AggregateId>, resource_owner: impl Into<ResourceOwner>) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            resource_owner: resource_owner.into(),
            ..Self::default()
        }
    }

    /// Record a recognised event.
    ///
    /// The first event fixes the owner and instance. Provisional events (not
    /// yet committed) never move the watermark.
    pub fn apply(&mut self, event: &StoredEvent) {
        if self.resource_owner.is_empty() {
            self.resource_owner = event.aggregate.resource_owner.clone();
        }
        if self.instance_id.is_empty() {
            self.instance_id = event.aggregate.instance_id.clone();
        }
        if event.is_committed() {
            self.processed_sequence = event.sequence;
            self.processed_position = event.position;
            self.change_date = Some(event.created_at);
        }
    }

    pub fn details(&self) -> ObjectDetails {
        ObjectDetails {
            sequence: self.processed_sequence,
            change_date: self.change_date.unwrap_or_default(),
            resource_owner: self.resource_owner.clone(),
        }
    }
}
