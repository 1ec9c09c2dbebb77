use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::envelope::StoredEvent;

/// Payload (de)serialization failure for a known event type.
///
/// This is the only way a reducer may fail: business-rule violations are
/// detected by callers after inspecting the reduced state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("event '{event_type}': {message}")]
pub struct PayloadError {
    pub event_type: String,
    pub message: String,
}

impl PayloadError {
    pub fn new(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            message: message.into(),
        }
    }
}

/// Serialize a typed payload into the stored JSON representation.
pub fn encode_payload<T: Serialize>(event_type: &str, payload: &T) -> Result<JsonValue, PayloadError> {
    serde_json::to_value(payload)
        .map_err(|e| PayloadError::new(event_type, format!("payload serialization failed: {e}")))
}

pub(crate) fn decode_payload<T: DeserializeOwned>(event: &StoredEvent) -> Result<T, PayloadError> {
    serde_json::from_value(event.payload.clone()).map_err(|e| {
        PayloadError::new(
            event.event_type.clone(),
            format!("payload deserialization failed: {e}"),
        )
    })
}

/// Closed vocabulary of the events one aggregate type understands.
///
/// Implemented by an enum with one variant per event type (see
/// [`aggregate_events!`](crate::aggregate_events)), so every reducer matching
/// on it is checked for exhaustiveness by the compiler.
pub trait AggregateEvent: Sized + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Aggregate type the events are appended to (e.g. `"target"`).
    const AGGREGATE_TYPE: &'static str;

    /// Every event type string of the vocabulary.
    const EVENT_TYPES: &'static [&'static str];

    /// Stable event type identifier (e.g. `"target.public_key.added"`).
    fn event_type(&self) -> &'static str;

    /// Decode a stored event.
    ///
    /// Returns `Ok(None)` for event types outside this vocabulary; those are
    /// ignored by reducers (forward compatibility).
    fn decode(event: &StoredEvent) -> Result<Option<Self>, PayloadError>;

    fn to_payload(&self) -> Result<JsonValue, PayloadError>;
}

/// Declare the event vocabulary of an aggregate.
///
/// Event types are string literals or `&str` constants.
///
/// ```ignore
/// aggregate_events! {
///     /// Events of the target aggregate.
///     pub enum TargetEvent for "target" {
///         Added(TargetAdded) = "target.added",
///         Removed(TargetRemoved) = TARGET_REMOVED,
///     }
/// }
/// ```
#[macro_export]
macro_rules! aggregate_events {
    (
        $(#[$meta:meta])*
        pub enum $name:ident for $aggregate:literal {
            $( $variant:ident($payload:ty) = $event_type:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $name {
            $( $variant($payload) ),+
        }

        impl $crate::AggregateEvent for $name {
            const AGGREGATE_TYPE: &'static str = $aggregate;
            const EVENT_TYPES: &'static [&'static str] = &[$($event_type),+];

            fn event_type(&self) -> &'static str {
                match self {
                    $( $name::$variant(_) => $event_type ),+
                }
            }

            fn decode(
                event: &$crate::StoredEvent,
            ) -> ::core::result::Result<::core::option::Option<Self>, $crate::PayloadError> {
                let event_type = event.event_type.as_str();
                $(
                    if event_type == $event_type {
                        return Ok(Some($name::$variant(event.payload_as::<$payload>()?)));
                    }
                )+
                Ok(None)
            }

            fn to_payload(&self) -> ::core::result::Result<$crate::JsonValue, $crate::PayloadError> {
                match self {
                    $( $name::$variant(payload) => $crate::encode_payload($event_type, payload) ),+
                }
            }
        }
    };
}
