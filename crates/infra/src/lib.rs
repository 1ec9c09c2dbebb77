//! Infrastructure layer: the event store collaborator and its adapters.

pub mod event_store;

pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, RecordingEventStore, with_deadline,
};
