//! Targets: outbound endpoints authenticated with rotating public keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, InstanceId, ResourceOwner};
use warden_events::{AggregateRef, aggregate_events};

pub const AGGREGATE_TYPE: &str = "target";

pub const ADDED: &str = "target.added";
pub const REMOVED: &str = "target.removed";
pub const PUBLIC_KEY_ADDED: &str = "target.public_key.added";
pub const PUBLIC_KEY_ACTIVATED: &str = "target.public_key.activated";
pub const PUBLIC_KEY_DEACTIVATED: &str = "target.public_key.deactivated";
pub const PUBLIC_KEY_REMOVED: &str = "target.public_key.removed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAdded {
    pub name: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetRemoved {}

/// A key registered on a target. Keys start inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPublicKeyAdded {
    pub key_id: String,
    /// PEM-encoded SubjectPublicKeyInfo as supplied by the caller.
    pub public_key: String,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPublicKeyActivated {
    pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPublicKeyDeactivated {
    pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPublicKeyRemoved {
    pub key_id: String,
}

aggregate_events! {
    /// Events of the `target` aggregate.
    pub enum TargetEvent for "target" {
        Added(TargetAdded) = ADDED,
        Removed(TargetRemoved) = REMOVED,
        PublicKeyAdded(TargetPublicKeyAdded) = PUBLIC_KEY_ADDED,
        PublicKeyActivated(TargetPublicKeyActivated) = PUBLIC_KEY_ACTIVATED,
        PublicKeyDeactivated(TargetPublicKeyDeactivated) = PUBLIC_KEY_DEACTIVATED,
        PublicKeyRemoved(TargetPublicKeyRemoved) = PUBLIC_KEY_REMOVED,
    }
}

pub fn aggregate(
    id: impl Into<AggregateId>,
    resource_owner: impl Into<ResourceOwner>,
    instance_id: impl Into<InstanceId>,
) -> AggregateRef {
    AggregateRef::new(AGGREGATE_TYPE, id, resource_owner, instance_id)
}
