//! Organisations, their domains and the org setup pipeline.

use std::collections::HashMap;

use tracing::instrument;

use warden_core::{AggregateId, ObjectDetails, RequestContext, UserId};
use warden_events::{EventFilter, PayloadError, PendingEvent, StoredEvent};
use warden_identity::org::{
    self, ORG_OWNER_ROLE, OrgAdded, OrgDomainAdded, OrgDomainPolicySet, OrgDomainPrimarySet,
    OrgDomainRemoved, OrgDomainVerified, OrgEvent, OrgMemberAdded,
};
use warden_infra::EventStore;

use crate::commands::Commands;
use crate::error::{CommandError, CommandResult};
use crate::preparation::{Validation, create_commands, validation};
use crate::push::pushed_details;
use crate::query_reducer::{FilterToQueryReducer, load_write_model};
use crate::user::{AddHumanUser, UserState, UserWriteModel, add_human_user_validation};
use crate::write_model::{WriteModel, WriteModelBase};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrgState {
    #[default]
    Unspecified,
    Active,
    Removed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DomainState {
    #[default]
    Unspecified,
    Active,
    Removed,
}

fn org_filter(base: &WriteModelBase, event_types: &[&str]) -> EventFilter {
    EventFilter::for_events::<OrgEvent>(event_types)
        .aggregate_id(base.aggregate_id.clone())
        .resource_owner(base.resource_owner.clone())
}

fn reduce_org_state(state: &mut OrgState, event: &OrgEvent) {
    match event {
        OrgEvent::Added(_) if *state == OrgState::Unspecified => *state = OrgState::Active,
        OrgEvent::Removed(_) => *state = OrgState::Removed,
        _ => {}
    }
}

/// Existence of one organisation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgWriteModel {
    pub base: WriteModelBase,
    pub state: OrgState,
    pub name: String,
}

impl OrgWriteModel {
    pub fn new(org_id: &AggregateId) -> Self {
        Self {
            base: WriteModelBase::new(org_id.clone(), org_id),
            state: OrgState::Unspecified,
            name: String::new(),
        }
    }
}

impl WriteModel for OrgWriteModel {
    fn query(&self) -> EventFilter {
        org_filter(&self.base, &[org::ADDED, org::REMOVED])
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<OrgEvent>()? else {
                continue;
            };
            match &event {
                OrgEvent::Added(e) => {
                    if self.state == OrgState::Unspecified {
                        self.name = e.name.clone();
                    }
                }
                OrgEvent::Removed(_) => {}
                OrgEvent::DomainAdded(_)
                | OrgEvent::DomainVerified(_)
                | OrgEvent::DomainPrimarySet(_)
                | OrgEvent::DomainRemoved(_)
                | OrgEvent::DomainPolicySet(_)
                | OrgEvent::MemberAdded(_) => continue,
            }
            reduce_org_state(&mut self.state, &event);
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

/// One domain of an organisation, plus what decides whether it needs
/// verification.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgDomainWriteModel {
    pub base: WriteModelBase,
    pub domain: String,
    pub org_state: OrgState,
    pub state: DomainState,
    pub verified: bool,
    pub primary: bool,
    /// Org-level override of the instance default; `None` until set.
    pub validate_org_domains: Option<bool>,
}

impl OrgDomainWriteModel {
    pub fn new(org_id: &AggregateId, domain: impl Into<String>) -> Self {
        Self {
            base: WriteModelBase::new(org_id.clone(), org_id),
            domain: domain.into(),
            org_state: OrgState::Unspecified,
            state: DomainState::Unspecified,
            verified: false,
            primary: false,
            validate_org_domains: None,
        }
    }

    pub fn validation_required(&self, instance_default: bool) -> bool {
        self.validate_org_domains.unwrap_or(instance_default)
    }

    fn require_domain(&self) -> CommandResult<()> {
        if self.org_state != OrgState::Active || self.state != DomainState::Active {
            return Err(CommandError::not_found("org domain not found"));
        }
        Ok(())
    }
}

impl WriteModel for OrgDomainWriteModel {
    fn query(&self) -> EventFilter {
        org_filter(
            &self.base,
            &[
                org::ADDED,
                org::REMOVED,
                org::DOMAIN_ADDED,
                org::DOMAIN_VERIFIED,
                org::DOMAIN_PRIMARY_SET,
                org::DOMAIN_REMOVED,
                org::DOMAIN_POLICY_SET,
            ],
        )
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<OrgEvent>()? else {
                continue;
            };
            match &event {
                OrgEvent::Added(_) | OrgEvent::Removed(_) => {}
                OrgEvent::DomainAdded(e) => {
                    if e.domain == self.domain {
                        self.state = DomainState::Active;
                        self.verified = false;
                        self.primary = false;
                    }
                }
                OrgEvent::DomainVerified(e) => {
                    if e.domain == self.domain && self.state == DomainState::Active {
                        self.verified = true;
                    }
                }
                OrgEvent::DomainPrimarySet(e) => self.primary = e.domain == self.domain,
                OrgEvent::DomainRemoved(e) => {
                    if e.domain == self.domain {
                        self.state = DomainState::Removed;
                        self.verified = false;
                        self.primary = false;
                    }
                }
                OrgEvent::DomainPolicySet(e) => {
                    self.validate_org_domains = Some(e.validate_org_domains);
                }
                OrgEvent::MemberAdded(_) => continue,
            }
            reduce_org_state(&mut self.org_state, &event);
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

/// Domain policy of one organisation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgDomainPolicyWriteModel {
    pub base: WriteModelBase,
    pub org_state: OrgState,
    pub validate_org_domains: Option<bool>,
}

impl OrgDomainPolicyWriteModel {
    pub fn new(org_id: &AggregateId) -> Self {
        Self {
            base: WriteModelBase::new(org_id.clone(), org_id),
            org_state: OrgState::Unspecified,
            validate_org_domains: None,
        }
    }
}

impl WriteModel for OrgDomainPolicyWriteModel {
    fn query(&self) -> EventFilter {
        org_filter(&self.base, &[org::ADDED, org::REMOVED, org::DOMAIN_POLICY_SET])
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<OrgEvent>()? else {
                continue;
            };
            match &event {
                OrgEvent::Added(_) | OrgEvent::Removed(_) => {}
                OrgEvent::DomainPolicySet(e) => {
                    self.validate_org_domains = Some(e.validate_org_domains);
                }
                OrgEvent::DomainAdded(_)
                | OrgEvent::DomainVerified(_)
                | OrgEvent::DomainPrimarySet(_)
                | OrgEvent::DomainRemoved(_)
                | OrgEvent::MemberAdded(_) => continue,
            }
            reduce_org_state(&mut self.org_state, &event);
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

/// Verified domains across the whole instance and the org holding each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifiedOrgDomainsWriteModel {
    pub base: WriteModelBase,
    holders: HashMap<String, AggregateId>,
}

impl VerifiedOrgDomainsWriteModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verified by an org other than `org_id`.
    pub fn held_by_other(&self, domain: &str, org_id: &AggregateId) -> bool {
        self.holders.get(domain).is_some_and(|holder| holder != org_id)
    }
}

impl WriteModel for VerifiedOrgDomainsWriteModel {
    fn query(&self) -> EventFilter {
        EventFilter::for_events::<OrgEvent>(&[org::DOMAIN_VERIFIED, org::DOMAIN_REMOVED, org::REMOVED])
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<OrgEvent>()? else {
                continue;
            };
            let org_id = &stored.aggregate.id;
            match event {
                OrgEvent::DomainVerified(e) => {
                    self.holders.entry(e.domain).or_insert_with(|| org_id.clone());
                }
                OrgEvent::DomainRemoved(e) => {
                    if self.holders.get(&e.domain) == Some(org_id) {
                        self.holders.remove(&e.domain);
                    }
                }
                OrgEvent::Removed(_) => self.holders.retain(|_, holder| *holder != *org_id),
                OrgEvent::Added(_)
                | OrgEvent::DomainAdded(_)
                | OrgEvent::DomainPrimarySet(_)
                | OrgEvent::DomainPolicySet(_)
                | OrgEvent::MemberAdded(_) => continue,
            }
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

/// Acknowledgement of [`Commands::setup_org`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgSetupDetails {
    pub org_id: AggregateId,
    pub user_id: UserId,
    pub details: ObjectDetails,
}

fn normalize_domain(domain: &str) -> CommandResult<String> {
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        return Err(CommandError::invalid_argument("domain is empty"));
    }
    Ok(domain)
}

/// `"ACME Corp."` → `"acme-corp"`.
fn domain_label(name: &str) -> String {
    let label: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    label
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Fails when another org of the instance holds `domain` verified.
async fn require_unclaimed(
    ctx: &RequestContext,
    filter: &dyn FilterToQueryReducer,
    org_id: &AggregateId,
    domain: &str,
) -> CommandResult<()> {
    let mut claimed = VerifiedOrgDomainsWriteModel::new();
    load_write_model(ctx, filter, &mut claimed).await?;
    if claimed.held_by_other(domain, org_id) {
        return Err(CommandError::already_exists("domain is taken by another org"));
    }
    Ok(())
}

fn org_event(ctx: &RequestContext, org_id: &AggregateId, event: &OrgEvent) -> CommandResult<PendingEvent> {
    let aggregate = org::aggregate(org_id, ctx.instance_id().clone());
    Ok(PendingEvent::new(&aggregate, ctx.actor(), event)?)
}

/// Add a domain; verified in the same batch when the effective policy does not
/// require verification.
fn add_org_domain_validation(org_id: AggregateId, domain: String, instance_default: bool) -> Validation {
    validation(move || {
        let domain = normalize_domain(&domain)?;
        Ok(create_commands(move |ctx, filter| {
            Box::pin(async move {
                let mut wm = OrgDomainWriteModel::new(&org_id, domain.clone());
                load_write_model(ctx, filter, &mut wm).await?;
                if wm.org_state != OrgState::Active {
                    return Err(CommandError::not_found("org not found"));
                }
                if wm.state == DomainState::Active {
                    return Err(CommandError::already_exists("domain already added to org"));
                }
                require_unclaimed(ctx, filter, &org_id, &domain).await?;

                let mut events = vec![org_event(
                    ctx,
                    &org_id,
                    &OrgEvent::DomainAdded(OrgDomainAdded { domain: domain.clone() }),
                )?];
                if !wm.validation_required(instance_default) {
                    events.push(org_event(
                        ctx,
                        &org_id,
                        &OrgEvent::DomainVerified(OrgDomainVerified { domain }),
                    )?);
                }
                Ok(events)
            })
        }))
    })
}

/// Mark an added domain verified, unless another org got to it first.
fn verify_org_domain_validation(org_id: AggregateId, domain: String) -> Validation {
    validation(move || {
        if org_id.is_empty() {
            return Err(CommandError::invalid_argument("org id is missing"));
        }
        let domain = normalize_domain(&domain)?;
        Ok(create_commands(move |ctx, filter| {
            Box::pin(async move {
                let mut wm = OrgDomainWriteModel::new(&org_id, domain.clone());
                load_write_model(ctx, filter, &mut wm).await?;
                wm.require_domain()?;
                if wm.verified {
                    return Err(CommandError::precondition_failed("domain already verified"));
                }
                require_unclaimed(ctx, filter, &org_id, &domain).await?;

                let event = OrgEvent::DomainVerified(OrgDomainVerified { domain });
                Ok(vec![org_event(ctx, &org_id, &event)?])
            })
        }))
    })
}

/// Create an organisation with a generated, verified, primary domain.
fn add_org_validation(org_id: AggregateId, name: String, instance_domain: String) -> Validation {
    validation(move || {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(CommandError::invalid_argument("org name is empty"));
        }
        let label = match domain_label(&name) {
            label if label.is_empty() => org_id.to_string(),
            label => label,
        };
        let domain = format!("{label}.{instance_domain}");

        Ok(create_commands(move |ctx, filter| {
            Box::pin(async move {
                let mut wm = OrgWriteModel::new(&org_id);
                load_write_model(ctx, filter, &mut wm).await?;
                if wm.state != OrgState::Unspecified {
                    return Err(CommandError::already_exists("org already exists"));
                }
                require_unclaimed(ctx, filter, &org_id, &domain).await?;

                let events = [
                    OrgEvent::Added(OrgAdded { name }),
                    OrgEvent::DomainAdded(OrgDomainAdded { domain: domain.clone() }),
                    OrgEvent::DomainVerified(OrgDomainVerified { domain: domain.clone() }),
                    OrgEvent::DomainPrimarySet(OrgDomainPrimarySet { domain }),
                ];
                let pending: CommandResult<Vec<PendingEvent>> =
                    events.iter().map(|event| org_event(ctx, &org_id, event)).collect();
                pending
            })
        }))
    })
}

/// Grant `roles` on the org to an existing user.
fn add_org_member_validation(org_id: AggregateId, user_id: UserId, roles: Vec<String>) -> Validation {
    validation(move || {
        if user_id.is_empty() {
            return Err(CommandError::invalid_argument("user id is missing"));
        }
        if roles.is_empty() {
            return Err(CommandError::invalid_argument("member needs at least one role"));
        }
        Ok(create_commands(move |ctx, filter| {
            Box::pin(async move {
                let mut org_wm = OrgWriteModel::new(&org_id);
                load_write_model(ctx, filter, &mut org_wm).await?;
                if org_wm.state != OrgState::Active {
                    return Err(CommandError::not_found("org not found"));
                }

                let mut user_wm = UserWriteModel::new(&user_id, "");
                load_write_model(ctx, filter, &mut user_wm).await?;
                if user_wm.state != UserState::Active {
                    return Err(CommandError::precondition_failed("user not found"));
                }

                let event = OrgEvent::MemberAdded(OrgMemberAdded { user_id, roles });
                Ok(vec![org_event(ctx, &org_id, &event)?])
            })
        }))
    })
}

impl<S: EventStore> Commands<S> {
    /// Create an organisation together with its first administrator in one
    /// atomic push: the org, its generated primary domain, a human user and
    /// the user's `ORG_OWNER` membership.
    #[instrument(skip(self, ctx, admin), fields(instance = %ctx.instance_id()), err)]
    pub async fn setup_org(
        &self,
        ctx: &RequestContext,
        name: &str,
        admin: AddHumanUser,
    ) -> CommandResult<OrgSetupDetails> {
        let org_id = AggregateId::new(self.next_id()?);
        let user_id = UserId::new(self.next_id()?);
        let name = name.to_string();
        let instance_domain = self.config.instance_domain.clone();

        let committed = self
            .prepare_and_push(ctx, || {
                vec![
                    add_org_validation(org_id.clone(), name.clone(), instance_domain.clone()),
                    add_human_user_validation(org_id.clone(), user_id.clone(), admin.clone()),
                    add_org_member_validation(
                        org_id.clone(),
                        user_id.clone(),
                        vec![ORG_OWNER_ROLE.to_string()],
                    ),
                ]
            })
            .await?;

        Ok(OrgSetupDetails {
            org_id,
            user_id,
            details: pushed_details(&committed)?,
        })
    }

    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn add_org_domain(
        &self,
        ctx: &RequestContext,
        org_id: &AggregateId,
        domain: &str,
    ) -> CommandResult<ObjectDetails> {
        let instance_default = self.config.validate_org_domains;
        let committed = self
            .prepare_and_push(ctx, || {
                vec![add_org_domain_validation(
                    org_id.clone(),
                    domain.to_string(),
                    instance_default,
                )]
            })
            .await?;
        pushed_details(&committed)
    }

    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn verify_org_domain(
        &self,
        ctx: &RequestContext,
        org_id: &AggregateId,
        domain: &str,
    ) -> CommandResult<ObjectDetails> {
        let committed = self
            .prepare_and_push(ctx, || {
                vec![verify_org_domain_validation(org_id.clone(), domain.to_string())]
            })
            .await?;
        pushed_details(&committed)
    }

    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn set_primary_org_domain(
        &self,
        ctx: &RequestContext,
        org_id: &AggregateId,
        domain: &str,
    ) -> CommandResult<ObjectDetails> {
        let mut wm = self.load_org_domain(ctx, org_id, domain).await?;
        if wm.primary {
            return Err(CommandError::precondition_failed("domain is already primary"));
        }
        if !wm.verified {
            return Err(CommandError::precondition_failed("domain is not verified"));
        }
        let event = OrgEvent::DomainPrimarySet(OrgDomainPrimarySet { domain: wm.domain.clone() });
        self.push_org_domain_event(ctx, &mut wm, event).await
    }

    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn remove_org_domain(
        &self,
        ctx: &RequestContext,
        org_id: &AggregateId,
        domain: &str,
    ) -> CommandResult<ObjectDetails> {
        let mut wm = self.load_org_domain(ctx, org_id, domain).await?;
        if wm.primary {
            return Err(CommandError::precondition_failed("primary domain cannot be removed"));
        }
        let event = OrgEvent::DomainRemoved(OrgDomainRemoved { domain: wm.domain.clone() });
        self.push_org_domain_event(ctx, &mut wm, event).await
    }

    /// Record whether the org's domains must be verified. Setting the current
    /// value again pushes nothing.
    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn set_org_domain_policy(
        &self,
        ctx: &RequestContext,
        org_id: &AggregateId,
        validate_org_domains: bool,
    ) -> CommandResult<ObjectDetails> {
        let mut wm = OrgDomainPolicyWriteModel::new(org_id);
        self.load(ctx, &mut wm).await?;
        if wm.org_state != OrgState::Active {
            return Err(CommandError::not_found("org not found"));
        }
        if wm.validate_org_domains == Some(validate_org_domains) {
            return Ok(wm.base.details());
        }

        let event = OrgEvent::DomainPolicySet(OrgDomainPolicySet { validate_org_domains });
        let pending = org_event(ctx, org_id, &event)?;
        self.push_and_sync(ctx, &mut wm, vec![pending]).await?;
        Ok(wm.base.details())
    }

    async fn load_org_domain(
        &self,
        ctx: &RequestContext,
        org_id: &AggregateId,
        domain: &str,
    ) -> CommandResult<OrgDomainWriteModel> {
        if org_id.is_empty() {
            return Err(CommandError::invalid_argument("org id is missing"));
        }
        let domain = normalize_domain(domain)?;

        let mut wm = OrgDomainWriteModel::new(org_id, domain);
        self.load(ctx, &mut wm).await?;
        wm.require_domain()?;
        Ok(wm)
    }

    async fn push_org_domain_event(
        &self,
        ctx: &RequestContext,
        wm: &mut OrgDomainWriteModel,
        event: OrgEvent,
    ) -> CommandResult<ObjectDetails> {
        let org_id = wm.base.aggregate_id.clone();
        let pending = org_event(ctx, &org_id, &event)?;
        self.push_and_sync(ctx, wm, vec![pending]).await?;
        Ok(wm.base.details())
    }
}
