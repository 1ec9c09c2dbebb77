//! Event filters and the optimistic-concurrency precondition of a push.

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, InstanceId, ResourceOwner};

use crate::envelope::StoredEvent;
use crate::event::AggregateEvent;

/// Selects events from the log.
///
/// Empty lists match everything; `instance_id` is imposed by the loader from
/// the request context and never chosen by write models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub instance_id: Option<InstanceId>,
    pub aggregate_types: Vec<String>,
    pub aggregate_ids: Vec<AggregateId>,
    pub resource_owner: Option<ResourceOwner>,
    pub event_types: Vec<String>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the aggregate type of `E` and the given subset of its events.
    pub fn for_events<E: AggregateEvent>(event_types: &[&str]) -> Self {
        Self::new()
            .aggregate_type(E::AGGREGATE_TYPE)
            .event_types(event_types.iter().copied())
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_types.push(aggregate_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: impl Into<AggregateId>) -> Self {
        self.aggregate_ids.push(id.into());
        self
    }

    pub fn resource_owner(mut self, owner: impl Into<ResourceOwner>) -> Self {
        let owner = owner.into();
        // An empty owner means "any owner".
        self.resource_owner = (!owner.is_empty()).then_some(owner);
        self
    }

    pub fn event_types<I, T>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.event_types.extend(event_types.into_iter().map(Into::into));
        self
    }

    /// Scope the filter to one instance (replaces any previous scope).
    pub fn for_instance(mut self, instance_id: InstanceId) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    pub fn matches(&self, event: &StoredEvent) -> bool {
        let aggregate = &event.aggregate;

        if let Some(instance_id) = &self.instance_id {
            if &aggregate.instance_id != instance_id {
                return false;
            }
        }
        if !self.aggregate_types.is_empty()
            && !self.aggregate_types.iter().any(|t| t == &aggregate.aggregate_type)
        {
            return false;
        }
        if !self.aggregate_ids.is_empty() && !self.aggregate_ids.contains(&aggregate.id) {
            return false;
        }
        if let Some(owner) = &self.resource_owner {
            if &aggregate.resource_owner != owner {
                return false;
            }
        }
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == &event.event_type)
    }
}

/// Precondition of a push: no committed event matching `filter` may exist
/// beyond `after_position`.
///
/// Produced from every query a command made while validating, so a push fails
/// atomically when another writer committed a relevant event in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendCondition {
    pub filter: EventFilter,
    pub after_position: u64,
}

impl AppendCondition {
    pub fn new(filter: EventFilter, after_position: u64) -> Self {
        Self {
            filter,
            after_position,
        }
    }

    /// True when `event` invalidates this condition.
    pub fn is_violated_by(&self, event: &StoredEvent) -> bool {
        event.position > self.after_position && self.filter.matches(event)
    }
}
