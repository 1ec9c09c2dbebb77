//! Human users and their recovery codes.

use serde::{Deserialize, Serialize};

use warden_core::{AggregateId, InstanceId, ResourceOwner};
use warden_events::{AggregateRef, aggregate_events};

pub const AGGREGATE_TYPE: &str = "user";

pub const HUMAN_ADDED: &str = "user.human.added";
pub const REMOVED: &str = "user.removed";
pub const LOCKED: &str = "user.locked";
pub const RECOVERY_CODES_ADDED: &str = "user.human.recovery_codes.added";
pub const RECOVERY_CODE_CHECK_SUCCEEDED: &str = "user.human.recovery_code.check.succeeded";
pub const RECOVERY_CODE_CHECK_FAILED: &str = "user.human.recovery_code.check.failed";
pub const RECOVERY_CODES_REMOVED: &str = "user.human.recovery_codes.removed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanUserAdded {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserRemoved {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserLocked {}

/// Recovery codes are only ever stored hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryCodesAdded {
    pub hashed_codes: Vec<String>,
}

/// Consumes the code at `code_index` of the live code list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryCodeCheckSucceeded {
    pub code_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecoveryCodeCheckFailed {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecoveryCodesRemoved {}

aggregate_events! {
    /// Events of the `user` aggregate.
    pub enum UserEvent for "user" {
        HumanAdded(HumanUserAdded) = HUMAN_ADDED,
        Removed(UserRemoved) = REMOVED,
        Locked(UserLocked) = LOCKED,
        RecoveryCodesAdded(RecoveryCodesAdded) = RECOVERY_CODES_ADDED,
        RecoveryCodeCheckSucceeded(RecoveryCodeCheckSucceeded) = RECOVERY_CODE_CHECK_SUCCEEDED,
        RecoveryCodeCheckFailed(RecoveryCodeCheckFailed) = RECOVERY_CODE_CHECK_FAILED,
        RecoveryCodesRemoved(RecoveryCodesRemoved) = RECOVERY_CODES_REMOVED,
    }
}

pub fn aggregate(
    id: impl Into<AggregateId>,
    resource_owner: impl Into<ResourceOwner>,
    instance_id: impl Into<InstanceId>,
) -> AggregateRef {
    AggregateRef::new(AGGREGATE_TYPE, id, resource_owner, instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_core::UserId;
    use warden_events::{AggregateEvent, PendingEvent};

    #[test]
    fn empty_payloads_round_trip_through_the_store_shape() {
        let event = UserEvent::RecoveryCodeCheckFailed(RecoveryCodeCheckFailed {});
        let pending =
            PendingEvent::new(&aggregate("u1", "o1", "inst1"), &UserId::new("u1"), &event).unwrap();
        assert_eq!(pending.payload, serde_json::json!({}));

        let stored = pending.provisional(Utc::now());
        assert_eq!(UserEvent::decode(&stored).unwrap(), Some(event));
    }
}
