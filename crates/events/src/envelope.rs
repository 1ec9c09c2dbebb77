use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use warden_core::{AggregateId, InstanceId, ObjectDetails, ResourceOwner, UserId};

use crate::event::{AggregateEvent, PayloadError, decode_payload};

/// Identifies one append-only stream.
///
/// `resource_owner` and `instance_id` are fixed by the first event of the
/// stream. Constructing a reference never touches the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateRef {
    pub aggregate_type: String,
    pub id: AggregateId,
    pub resource_owner: ResourceOwner,
    pub instance_id: InstanceId,
}

impl AggregateRef {
    pub fn new(
        aggregate_type: impl Into<String>,
        id: impl Into<AggregateId>,
        resource_owner: impl Into<ResourceOwner>,
        instance_id: impl Into<InstanceId>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id: id.into(),
            resource_owner: resource_owner.into(),
            instance_id: instance_id.into(),
        }
    }
}

/// An event ready to be pushed (no sequence, position or creation date yet).
///
/// The store assigns those at commit time; callers never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    pub aggregate: AggregateRef,
    pub event_type: String,
    pub payload: JsonValue,
    pub creator: UserId,
}

impl PendingEvent {
    /// Wrap a typed event for `aggregate`, stamped with the acting principal.
    pub fn new<E: AggregateEvent>(
        aggregate: &AggregateRef,
        creator: &UserId,
        event: &E,
    ) -> Result<Self, PayloadError> {
        debug_assert_eq!(aggregate.aggregate_type, E::AGGREGATE_TYPE);
        Ok(Self {
            aggregate: aggregate.clone(),
            event_type: event.event_type().to_string(),
            payload: event.to_payload()?,
            creator: creator.clone(),
        })
    }

    /// View of this event as seen by later steps of the same pipeline, before
    /// it is committed: sequence and position are zero.
    pub fn provisional(&self, created_at: DateTime<Utc>) -> StoredEvent {
        StoredEvent {
            aggregate: self.aggregate.clone(),
            sequence: 0,
            position: 0,
            event_type: self.event_type.clone(),
            payload: self.payload.clone(),
            created_at,
            creator: self.creator.clone(),
        }
    }
}

/// A committed event.
///
/// `sequence` is strictly increasing per aggregate stream; `position` is
/// strictly increasing across the instance's whole log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub aggregate: AggregateRef,
    pub sequence: u64,
    pub position: u64,
    pub event_type: String,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
    pub creator: UserId,
}

impl StoredEvent {
    /// Provisional events (see [`PendingEvent::provisional`]) are not committed.
    pub fn is_committed(&self) -> bool {
        self.sequence > 0
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        decode_payload(self)
    }

    pub fn decode<E: AggregateEvent>(&self) -> Result<Option<E>, PayloadError> {
        E::decode(self)
    }

    pub fn details(&self) -> ObjectDetails {
        ObjectDetails {
            sequence: self.sequence,
            change_date: self.created_at,
            resource_owner: self.aggregate.resource_owner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Renamed {
        pub name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Closed {}

    crate::aggregate_events! {
        pub enum ThingEvent for "thing" {
            Renamed(Renamed) = "thing.renamed",
            Closed(Closed) = "thing.closed",
        }
    }

    fn aggregate() -> AggregateRef {
        AggregateRef::new("thing", "t1", "org1", "inst1")
    }

    fn committed(event: &PendingEvent, sequence: u64) -> StoredEvent {
        StoredEvent {
            sequence,
            position: sequence,
            ..event.provisional(Utc::now())
        }
    }

    #[test]
    fn pending_event_carries_type_payload_and_creator() {
        let event = ThingEvent::Renamed(Renamed { name: "a".into() });
        let pending = PendingEvent::new(&aggregate(), &UserId::new("u1"), &event).unwrap();
        assert_eq!(pending.event_type, "thing.renamed");
        assert_eq!(pending.payload["name"], "a");
        assert_eq!(pending.creator.as_str(), "u1");
    }

    #[test]
    fn known_event_types_decode_into_the_vocabulary() {
        let event = ThingEvent::Renamed(Renamed { name: "b".into() });
        let pending = PendingEvent::new(&aggregate(), &UserId::new("u1"), &event).unwrap();
        let stored = committed(&pending, 1);
        assert_eq!(stored.decode::<ThingEvent>().unwrap(), Some(event));
    }

    #[test]
    fn unknown_event_types_decode_to_none() {
        let pending = PendingEvent {
            aggregate: aggregate(),
            event_type: "thing.painted".to_string(),
            payload: serde_json::json!({"color": "red"}),
            creator: UserId::new("u1"),
        };
        let stored = committed(&pending, 1);
        assert_eq!(stored.decode::<ThingEvent>().unwrap(), None);
    }

    #[test]
    fn malformed_payload_of_known_type_is_an_error() {
        let pending = PendingEvent {
            aggregate: aggregate(),
            event_type: "thing.renamed".to_string(),
            payload: serde_json::json!({"name": 42}),
            creator: UserId::new("u1"),
        };
        let err = committed(&pending, 1).decode::<ThingEvent>().unwrap_err();
        assert_eq!(err.event_type, "thing.renamed");
    }

    #[test]
    fn provisional_events_are_not_committed() {
        let event = ThingEvent::Closed(Closed {});
        let pending = PendingEvent::new(&aggregate(), &UserId::new("u1"), &event).unwrap();
        assert!(!pending.provisional(Utc::now()).is_committed());
        assert!(committed(&pending, 3).is_committed());
    }

    #[test]
    fn details_come_from_the_event() {
        let event = ThingEvent::Closed(Closed {});
        let pending = PendingEvent::new(&aggregate(), &UserId::new("u1"), &event).unwrap();
        let stored = committed(&pending, 7);
        let details = stored.details();
        assert_eq!(details.sequence, 7);
        assert_eq!(details.change_date, stored.created_at);
        assert_eq!(details.resource_owner.as_str(), "org1");
    }
}
