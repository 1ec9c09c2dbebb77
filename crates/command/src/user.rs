//! Human users and their recovery codes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{instrument, warn};

use warden_core::{AggregateId, ObjectDetails, RequestContext, ResourceOwner, UserId};
use warden_events::{EventFilter, PayloadError, PendingEvent, StoredEvent};
use warden_identity::user::{
    self, HumanUserAdded, RecoveryCodeCheckFailed, RecoveryCodeCheckSucceeded, RecoveryCodesAdded,
    RecoveryCodesRemoved, UserEvent, UserLocked, UserRemoved,
};
use warden_infra::EventStore;

use crate::commands::Commands;
use crate::error::{CommandError, CommandResult};
use crate::org::{OrgState, OrgWriteModel};
use crate::permission::{PermissionCheck, USER_CREDENTIAL_WRITE};
use crate::preparation::{Validation, create_commands, validation};
use crate::push::pushed_details;
use crate::query_reducer::load_write_model;
use crate::write_model::{WriteModel, WriteModelBase};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserState {
    #[default]
    Unspecified,
    Active,
    Removed,
}

/// Input of [`Commands::add_human_user`] and [`Commands::setup_org`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddHumanUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

/// One human user: lifecycle, lockout and live recovery codes.
#[derive(Debug, Clone, PartialEq)]
pub struct UserWriteModel {
    pub base: WriteModelBase,
    pub state: UserState,
    pub locked: bool,
    pub username: String,
    /// Hashes of the codes not yet consumed, in issue order.
    pub hashed_codes: Vec<String>,
    /// Failed recovery code checks since the last success.
    pub failed_attempts: u32,
}

impl UserWriteModel {
    pub fn new(user_id: &UserId, resource_owner: impl Into<ResourceOwner>) -> Self {
        Self {
            base: WriteModelBase::new(AggregateId::from(user_id), resource_owner),
            state: UserState::Unspecified,
            locked: false,
            username: String::new(),
            hashed_codes: Vec::new(),
            failed_attempts: 0,
        }
    }

    pub fn user_id(&self) -> UserId {
        UserId::from(&self.base.aggregate_id)
    }
}

impl WriteModel for UserWriteModel {
    fn query(&self) -> EventFilter {
        EventFilter::for_events::<UserEvent>(&[
            user::HUMAN_ADDED,
            user::REMOVED,
            user::LOCKED,
            user::RECOVERY_CODES_ADDED,
            user::RECOVERY_CODE_CHECK_SUCCEEDED,
            user::RECOVERY_CODE_CHECK_FAILED,
            user::RECOVERY_CODES_REMOVED,
        ])
        .aggregate_id(self.base.aggregate_id.clone())
        .resource_owner(self.base.resource_owner.clone())
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<UserEvent>()? else {
                continue;
            };
            if self.state == UserState::Removed {
                self.base.apply(stored);
                continue;
            }
            match event {
                UserEvent::HumanAdded(e) => {
                    self.state = UserState::Active;
                    self.username = e.username;
                }
                UserEvent::Removed(_) => {
                    self.state = UserState::Removed;
                    self.hashed_codes.clear();
                }
                UserEvent::Locked(_) => self.locked = true,
                UserEvent::RecoveryCodesAdded(e) => self.hashed_codes.extend(e.hashed_codes),
                UserEvent::RecoveryCodeCheckSucceeded(e) => {
                    if e.code_index < self.hashed_codes.len() {
                        self.hashed_codes.remove(e.code_index);
                    }
                    self.failed_attempts = 0;
                }
                UserEvent::RecoveryCodeCheckFailed(_) => self.failed_attempts += 1,
                UserEvent::RecoveryCodesRemoved(_) => self.hashed_codes.clear(),
            }
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

/// Usernames in use across the whole instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsernamesWriteModel {
    pub base: WriteModelBase,
    usernames: HashMap<AggregateId, String>,
}

impl UsernamesWriteModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive.
    pub fn is_taken(&self, username: &str) -> bool {
        self.usernames.values().any(|taken| taken.eq_ignore_ascii_case(username))
    }
}

impl WriteModel for UsernamesWriteModel {
    fn query(&self) -> EventFilter {
        EventFilter::for_events::<UserEvent>(&[user::HUMAN_ADDED, user::REMOVED])
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<UserEvent>()? else {
                continue;
            };
            match event {
                UserEvent::HumanAdded(e) => {
                    self.usernames.insert(stored.aggregate.id.clone(), e.username);
                }
                UserEvent::Removed(_) => {
                    self.usernames.remove(&stored.aggregate.id);
                }
                UserEvent::Locked(_)
                | UserEvent::RecoveryCodesAdded(_)
                | UserEvent::RecoveryCodeCheckSucceeded(_)
                | UserEvent::RecoveryCodeCheckFailed(_)
                | UserEvent::RecoveryCodesRemoved(_) => continue,
            }
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

fn user_event(ctx: &RequestContext, wm: &UserWriteModel, event: &UserEvent) -> CommandResult<PendingEvent> {
    let aggregate = user::aggregate(
        wm.base.aggregate_id.clone(),
        wm.base.resource_owner.clone(),
        ctx.instance_id().clone(),
    );
    Ok(PendingEvent::new(&aggregate, ctx.actor(), event)?)
}

/// Add a human user to an org. The username must be free across the
/// instance, counting users added earlier in the same pipeline.
pub(crate) fn add_human_user_validation(org_id: AggregateId, user_id: UserId, input: AddHumanUser) -> Validation {
    validation(move || {
        if org_id.is_empty() {
            return Err(CommandError::invalid_argument("org id is missing"));
        }
        let username = input.username.trim().to_string();
        if username.is_empty() {
            return Err(CommandError::invalid_argument("username is empty"));
        }
        let email = input.email.trim().to_string();
        if !email.contains('@') {
            return Err(CommandError::invalid_argument("email is invalid"));
        }
        let display_name = input.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(CommandError::invalid_argument("display name is empty"));
        }

        Ok(create_commands(move |ctx, filter| {
            Box::pin(async move {
                let mut org_wm = OrgWriteModel::new(&org_id);
                load_write_model(ctx, filter, &mut org_wm).await?;
                if org_wm.state != OrgState::Active {
                    return Err(CommandError::not_found("org not found"));
                }

                let mut usernames = UsernamesWriteModel::new();
                load_write_model(ctx, filter, &mut usernames).await?;
                if usernames.is_taken(&username) {
                    return Err(CommandError::already_exists("username already taken"));
                }

                let aggregate = user::aggregate(
                    AggregateId::from(&user_id),
                    ResourceOwner::from(&org_id),
                    ctx.instance_id().clone(),
                );
                let event = UserEvent::HumanAdded(HumanUserAdded {
                    username,
                    email,
                    display_name,
                });
                Ok(vec![PendingEvent::new(&aggregate, ctx.actor(), &event)?])
            })
        }))
    })
}

/// Append already hashed codes to an active user, keeping the total within
/// `max_count`.
fn add_recovery_codes_validation(
    user_id: UserId,
    owner: ResourceOwner,
    hashed_codes: Vec<String>,
    permissions: Arc<dyn PermissionCheck>,
    max_count: usize,
) -> Validation {
    validation(move || {
        Ok(create_commands(move |ctx, filter| {
            Box::pin(async move {
                let mut wm = UserWriteModel::new(&user_id, owner);
                load_write_model(ctx, filter, &mut wm).await?;
                if wm.state != UserState::Active {
                    return Err(CommandError::precondition_failed("user not found"));
                }
                if ctx.actor() != &user_id {
                    permissions.check(
                        ctx,
                        USER_CREDENTIAL_WRITE,
                        &wm.base.resource_owner,
                        &wm.base.aggregate_id,
                    )?;
                }
                if wm.hashed_codes.len() + hashed_codes.len() > max_count {
                    return Err(CommandError::already_exists(format!(
                        "user already has {} of at most {max_count} recovery codes",
                        wm.hashed_codes.len()
                    )));
                }
                let event = UserEvent::RecoveryCodesAdded(RecoveryCodesAdded { hashed_codes });
                Ok(vec![user_event(ctx, &wm, &event)?])
            })
        }))
    })
}

fn require_user_id(user_id: &UserId) -> CommandResult<()> {
    if user_id.is_empty() {
        return Err(CommandError::invalid_argument("user id is missing"));
    }
    Ok(())
}

impl<S: EventStore> Commands<S> {
    #[instrument(skip(self, ctx, input), fields(instance = %ctx.instance_id()), err)]
    pub async fn add_human_user(
        &self,
        ctx: &RequestContext,
        org_id: &AggregateId,
        input: AddHumanUser,
    ) -> CommandResult<(UserId, ObjectDetails)> {
        let user_id = UserId::new(self.next_id()?);
        let committed = self
            .prepare_and_push(ctx, || {
                vec![add_human_user_validation(org_id.clone(), user_id.clone(), input.clone())]
            })
            .await?;
        Ok((user_id, pushed_details(&committed)?))
    }

    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn remove_user(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        resource_owner: &ResourceOwner,
    ) -> CommandResult<ObjectDetails> {
        require_user_id(user_id)?;

        let mut wm = UserWriteModel::new(user_id, resource_owner.clone());
        self.load(ctx, &mut wm).await?;
        if wm.state != UserState::Active {
            return Err(CommandError::not_found("user not found"));
        }

        let pending = user_event(ctx, &wm, &UserEvent::Removed(UserRemoved {}))?;
        self.push_and_sync(ctx, &mut wm, vec![pending]).await?;
        Ok(wm.base.details())
    }

    /// Issue `count` new recovery codes, added to any the user already has.
    ///
    /// The plain codes are returned once; only their hashes are stored.
    /// Managing another user's codes needs [`USER_CREDENTIAL_WRITE`].
    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn generate_recovery_codes(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        resource_owner: &ResourceOwner,
        count: usize,
    ) -> CommandResult<(Vec<String>, ObjectDetails)> {
        let limits = self.config.recovery_codes.clone();
        require_user_id(user_id)?;
        if count == 0 || count > limits.max_count {
            return Err(CommandError::invalid_argument(format!(
                "recovery code count must be between 1 and {}",
                limits.max_count
            )));
        }

        let codes = (0..count)
            .map(|_| self.secret_generator.generate(limits.code_length))
            .collect::<CommandResult<Vec<_>>>()?;
        let hashed_codes = codes
            .iter()
            .map(|code| self.secret_hasher.hash(code))
            .collect::<CommandResult<Vec<_>>>()?;

        let committed = self
            .prepare_and_push(ctx, || {
                vec![add_recovery_codes_validation(
                    user_id.clone(),
                    resource_owner.clone(),
                    hashed_codes.clone(),
                    self.permissions.clone(),
                    limits.max_count,
                )]
            })
            .await?;

        Ok((codes, pushed_details(&committed)?))
    }

    /// Add recovery codes hashed elsewhere, e.g. when migrating users from
    /// another system. Same limits and permission as
    /// [`Commands::generate_recovery_codes`].
    #[instrument(skip(self, ctx, hashed_codes), fields(instance = %ctx.instance_id()), err)]
    pub async fn import_recovery_codes(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        resource_owner: &ResourceOwner,
        hashed_codes: Vec<String>,
    ) -> CommandResult<ObjectDetails> {
        require_user_id(user_id)?;
        if hashed_codes.is_empty() {
            return Err(CommandError::invalid_argument("no recovery codes to import"));
        }
        if hashed_codes.iter().any(|hashed| hashed.trim().is_empty()) {
            return Err(CommandError::invalid_argument("recovery code hash is empty"));
        }

        let max_count = self.config.recovery_codes.max_count;
        let committed = self
            .prepare_and_push(ctx, || {
                vec![add_recovery_codes_validation(
                    user_id.clone(),
                    resource_owner.clone(),
                    hashed_codes.clone(),
                    self.permissions.clone(),
                    max_count,
                )]
            })
            .await?;
        pushed_details(&committed)
    }

    /// Consume one recovery code.
    ///
    /// A wrong code is recorded as a failed check before the error is
    /// returned; with `max_recovery_code_attempts` set, the failure reaching
    /// the limit also locks the user.
    #[instrument(skip(self, ctx, code), fields(instance = %ctx.instance_id()), err)]
    pub async fn check_recovery_code(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        resource_owner: &ResourceOwner,
        code: &str,
    ) -> CommandResult<ObjectDetails> {
        require_user_id(user_id)?;
        if code.trim().is_empty() {
            return Err(CommandError::invalid_argument("recovery code is empty"));
        }

        let mut wm = UserWriteModel::new(user_id, resource_owner.clone());
        self.load(ctx, &mut wm).await?;
        if wm.state != UserState::Active || wm.locked {
            return Err(CommandError::not_found("user not found"));
        }
        if wm.hashed_codes.is_empty() {
            return Err(CommandError::precondition_failed("user has no recovery codes"));
        }

        let matched = wm
            .hashed_codes
            .iter()
            .position(|hashed| self.secret_hasher.verify(code, hashed));
        if let Some(code_index) = matched {
            let event = UserEvent::RecoveryCodeCheckSucceeded(RecoveryCodeCheckSucceeded { code_index });
            let pending = user_event(ctx, &wm, &event)?;
            self.push_and_sync(ctx, &mut wm, vec![pending]).await?;
            return Ok(wm.base.details());
        }

        let mut events = vec![user_event(
            ctx,
            &wm,
            &UserEvent::RecoveryCodeCheckFailed(RecoveryCodeCheckFailed {}),
        )?];
        let max_attempts = self.config.max_recovery_code_attempts;
        let lock = max_attempts > 0 && wm.failed_attempts + 1 >= max_attempts;
        if lock {
            events.push(user_event(ctx, &wm, &UserEvent::Locked(UserLocked {}))?);
        }
        self.push_and_sync(ctx, &mut wm, events).await?;
        warn!(user = %user_id, attempts = wm.failed_attempts, locked = lock, "recovery code check failed");
        Err(CommandError::invalid_argument("invalid recovery code"))
    }

    /// Drop every live recovery code of a user.
    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn remove_recovery_codes(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        resource_owner: &ResourceOwner,
    ) -> CommandResult<ObjectDetails> {
        require_user_id(user_id)?;

        let mut wm = UserWriteModel::new(user_id, resource_owner.clone());
        self.load(ctx, &mut wm).await?;
        if wm.state != UserState::Active {
            return Err(CommandError::not_found("user not found"));
        }
        if ctx.actor() != user_id {
            self.permissions.check(
                ctx,
                USER_CREDENTIAL_WRITE,
                &wm.base.resource_owner,
                &wm.base.aggregate_id,
            )?;
        }
        if wm.locked {
            return Err(CommandError::not_found("user not found"));
        }
        if wm.hashed_codes.is_empty() {
            return Err(CommandError::precondition_failed("user has no recovery codes"));
        }

        let pending = user_event(ctx, &wm, &UserEvent::RecoveryCodesRemoved(RecoveryCodesRemoved {}))?;
        self.push_and_sync(ctx, &mut wm, vec![pending]).await?;
        Ok(wm.base.details())
    }
}
