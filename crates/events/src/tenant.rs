use warden_core::InstanceId;

use crate::{AggregateRef, PendingEvent, StoredEvent};

/// Marks types that belong to exactly one instance.
///
/// Stores use it to reject batches and results that straddle the tenant
/// boundary.
pub trait TenantScoped {
    fn instance_id(&self) -> &InstanceId;

    fn belongs_to(&self, instance_id: &InstanceId) -> bool {
        self.instance_id() == instance_id
    }
}

impl TenantScoped for AggregateRef {
    fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }
}

impl TenantScoped for PendingEvent {
    fn instance_id(&self) -> &InstanceId {
        &self.aggregate.instance_id
    }
}

impl TenantScoped for StoredEvent {
    fn instance_id(&self) -> &InstanceId {
        &self.aggregate.instance_id
    }
}
