//! Request-scoped context handed explicitly to every command entry point.

use std::time::{Duration, Instant};

use crate::id::{InstanceId, UserId};

/// Tenant + actor context for one request.
///
/// Every query and push is scoped to `instance_id`; `actor` is stamped as the
/// creator of new events. The optional deadline is inherited by every store
/// call made on behalf of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    instance_id: InstanceId,
    actor: UserId,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(instance_id: impl Into<InstanceId>, actor: impl Into<UserId>) -> Self {
        Self {
            instance_id: instance_id.into(),
            actor: actor.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn actor(&self) -> &UserId {
        &self.actor
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the deadline (if any) has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
