//! Append-only event store boundary.
//!
//! This module defines the infrastructure-facing abstraction the command
//! engine loads from and pushes to, without making storage assumptions.

mod deadline;
pub mod in_memory;
pub mod recording;
pub mod r#trait;

pub use deadline::with_deadline;
pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError};
pub use recording::RecordingEventStore;
