//! Event model of the command side.
//!
//! An aggregate is an append-only, tenant-scoped stream of events. This crate
//! describes those streams and the events in them; it performs no IO.

pub mod envelope;
pub mod event;
pub mod filter;
pub mod tenant;

pub use envelope::{AggregateRef, PendingEvent, StoredEvent};
pub use event::{AggregateEvent, PayloadError, encode_payload};
pub use filter::{AppendCondition, EventFilter};
pub use tenant::TenantScoped;

#[doc(hidden)]
pub use serde_json::Value as JsonValue;
