//! Authorization collaborator.

use warden_core::{AggregateId, RequestContext, ResourceOwner};

use crate::error::{CommandError, CommandResult};

/// Permission required to manage another user's credentials.
pub const USER_CREDENTIAL_WRITE: &str = "user.credential.write";

/// Decides whether the request's actor holds `permission` on a resource.
pub trait PermissionCheck: Send + Sync {
    fn check(
        &self,
        ctx: &RequestContext,
        permission: &str,
        resource_owner: &ResourceOwner,
        aggregate_id: &AggregateId,
    ) -> CommandResult<()>;
}

/// Grants everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn check(&self, _: &RequestContext, _: &str, _: &ResourceOwner, _: &AggregateId) -> CommandResult<()> {
        Ok(())
    }
}

/// Denies everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl PermissionCheck for DenyAll {
    fn check(
        &self,
        ctx: &RequestContext,
        permission: &str,
        _resource_owner: &ResourceOwner,
        aggregate_id: &AggregateId,
    ) -> CommandResult<()> {
        Err(CommandError::permission_denied(format!(
            "{} lacks '{permission}' on {aggregate_id}",
            ctx.actor()
        )))
    }
}
