//! Targets and their public keys.
//!
//! A target may hold several keys; keys start inactive and more than one may
//! be active at a time so callers can rotate without downtime. Removing a key
//! requires deactivating it first.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::instrument;

use warden_core::{AggregateId, ObjectDetails, RequestContext, ResourceOwner};
use warden_events::{AggregateEvent, EventFilter, PayloadError, PendingEvent, StoredEvent};
use warden_identity::target::{
    self, TargetAdded, TargetEvent, TargetPublicKeyActivated, TargetPublicKeyAdded,
    TargetPublicKeyDeactivated, TargetPublicKeyRemoved, TargetRemoved,
};
use warden_infra::EventStore;

use crate::commands::Commands;
use crate::crypto::public_key_fingerprint;
use crate::error::{CommandError, CommandResult};
use crate::preparation::{create_commands, validation};
use crate::push::pushed_details;
use crate::query_reducer::load_write_model;
use crate::write_model::{WriteModel, WriteModelBase};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetState {
    #[default]
    Unspecified,
    Active,
    Removed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublicKeyState {
    #[default]
    Unspecified,
    Inactive,
    Active,
    Removed,
}

fn target_filter(base: &WriteModelBase, event_types: &[&str]) -> EventFilter {
    EventFilter::for_events::<TargetEvent>(event_types)
        .aggregate_id(base.aggregate_id.clone())
        .resource_owner(base.resource_owner.clone())
}

/// Existence of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetWriteModel {
    pub base: WriteModelBase,
    pub state: TargetState,
    pub name: String,
    pub endpoint: String,
}

impl TargetWriteModel {
    pub fn new(target_id: impl Into<AggregateId>, resource_owner: impl Into<ResourceOwner>) -> Self {
        Self {
            base: WriteModelBase::new(target_id, resource_owner),
            state: TargetState::Unspecified,
            name: String::new(),
            endpoint: String::new(),
        }
    }
}

impl WriteModel for TargetWriteModel {
    fn query(&self) -> EventFilter {
        target_filter(&self.base, &[target::ADDED, target::REMOVED])
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<TargetEvent>()? else {
                continue;
            };
            match event {
                TargetEvent::Added(e) => {
                    if self.state == TargetState::Unspecified {
                        self.state = TargetState::Active;
                        self.name = e.name;
                        self.endpoint = e.endpoint;
                    }
                }
                TargetEvent::Removed(_) => self.state = TargetState::Removed,
                TargetEvent::PublicKeyAdded(_)
                | TargetEvent::PublicKeyActivated(_)
                | TargetEvent::PublicKeyDeactivated(_)
                | TargetEvent::PublicKeyRemoved(_) => continue,
            }
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEntry {
    pub fingerprint: String,
    pub expiration: Option<DateTime<Utc>>,
    pub active: bool,
}

/// A target and all of its live keys.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPublicKeysWriteModel {
    pub base: WriteModelBase,
    pub state: TargetState,
    pub keys: BTreeMap<String, PublicKeyEntry>,
}

impl TargetPublicKeysWriteModel {
    pub fn new(target_id: impl Into<AggregateId>, resource_owner: impl Into<ResourceOwner>) -> Self {
        Self {
            base: WriteModelBase::new(target_id, resource_owner),
            state: TargetState::Unspecified,
            keys: BTreeMap::new(),
        }
    }

    pub fn has_fingerprint(&self, fingerprint: &str) -> bool {
        self.keys.values().any(|k| k.fingerprint == fingerprint)
    }
}

impl WriteModel for TargetPublicKeysWriteModel {
    fn query(&self) -> EventFilter {
        target_filter(&self.base, TargetEvent::EVENT_TYPES)
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<TargetEvent>()? else {
                continue;
            };
            match event {
                TargetEvent::Added(_) => {
                    if self.state == TargetState::Unspecified {
                        self.state = TargetState::Active;
                    }
                }
                TargetEvent::Removed(_) => {
                    self.state = TargetState::Removed;
                    self.keys.clear();
                }
                TargetEvent::PublicKeyAdded(e) => {
                    if self.state == TargetState::Active {
                        self.keys.insert(
                            e.key_id,
                            PublicKeyEntry {
                                fingerprint: e.fingerprint,
                                expiration: e.expiration,
                                active: false,
                            },
                        );
                    }
                }
                TargetEvent::PublicKeyActivated(e) => {
                    if let Some(key) = self.keys.get_mut(&e.key_id) {
                        key.active = true;
                    }
                }
                TargetEvent::PublicKeyDeactivated(e) => {
                    if let Some(key) = self.keys.get_mut(&e.key_id) {
                        key.active = false;
                    }
                }
                TargetEvent::PublicKeyRemoved(e) => {
                    self.keys.remove(&e.key_id);
                }
            }
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

/// One key of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPublicKeyWriteModel {
    pub base: WriteModelBase,
    pub key_id: String,
    pub state: PublicKeyState,
    pub expiration: Option<DateTime<Utc>>,
}

impl TargetPublicKeyWriteModel {
    pub fn new(
        target_id: impl Into<AggregateId>,
        resource_owner: impl Into<ResourceOwner>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            base: WriteModelBase::new(target_id, resource_owner),
            key_id: key_id.into(),
            state: PublicKeyState::Unspecified,
            expiration: None,
        }
    }

    /// Present and not removed.
    pub fn exists(&self) -> bool {
        matches!(self.state, PublicKeyState::Inactive | PublicKeyState::Active)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|e| e <= now)
    }
}

impl WriteModel for TargetPublicKeyWriteModel {
    fn query(&self) -> EventFilter {
        target_filter(
            &self.base,
            &[
                target::REMOVED,
                target::PUBLIC_KEY_ADDED,
                target::PUBLIC_KEY_ACTIVATED,
                target::PUBLIC_KEY_DEACTIVATED,
                target::PUBLIC_KEY_REMOVED,
            ],
        )
    }

    fn reduce(&mut self, events: &[StoredEvent]) -> Result<(), PayloadError> {
        for stored in events {
            let Some(event) = stored.decode::<TargetEvent>()? else {
                continue;
            };
            let removed = self.state == PublicKeyState::Removed;
            match event {
                TargetEvent::Added(_) => continue,
                TargetEvent::Removed(_) => self.state = PublicKeyState::Removed,
                TargetEvent::PublicKeyAdded(e) => {
                    if e.key_id == self.key_id && !removed {
                        self.state = PublicKeyState::Inactive;
                        self.expiration = e.expiration;
                    }
                }
                TargetEvent::PublicKeyActivated(e) => {
                    if e.key_id == self.key_id && self.exists() {
                        self.state = PublicKeyState::Active;
                    }
                }
                TargetEvent::PublicKeyDeactivated(e) => {
                    if e.key_id == self.key_id && self.exists() {
                        self.state = PublicKeyState::Inactive;
                    }
                }
                TargetEvent::PublicKeyRemoved(e) => {
                    if e.key_id == self.key_id {
                        self.state = PublicKeyState::Removed;
                    }
                }
            }
            self.base.apply(stored);
        }
        Ok(())
    }

    fn base(&self) -> &WriteModelBase {
        &self.base
    }
}

fn require_id(value: &str, what: &str) -> CommandResult<()> {
    if value.trim().is_empty() {
        return Err(CommandError::invalid_argument(format!("{what} is missing")));
    }
    Ok(())
}

impl<S: EventStore> Commands<S> {
    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn add_target(
        &self,
        ctx: &RequestContext,
        resource_owner: &ResourceOwner,
        name: &str,
        endpoint: &str,
    ) -> CommandResult<(AggregateId, ObjectDetails)> {
        let owner = resource_owner.clone();
        let name = name.trim().to_string();
        let endpoint = endpoint.trim().to_string();
        require_id(owner.as_str(), "resource owner")?;
        if name.is_empty() {
            return Err(CommandError::invalid_argument("target name is empty"));
        }
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(CommandError::invalid_argument("target endpoint must be an http(s) url"));
        }
        let target_id = AggregateId::new(self.next_id()?);

        let committed = self
            .prepare_and_push(ctx, || {
                let (target_id, owner, name, endpoint) =
                    (target_id.clone(), owner.clone(), name.clone(), endpoint.clone());
                vec![validation(move || {
                    Ok(create_commands(move |ctx, filter| {
                        Box::pin(async move {
                            let mut wm = TargetWriteModel::new(target_id.clone(), owner.clone());
                            load_write_model(ctx, filter, &mut wm).await?;
                            if wm.state != TargetState::Unspecified {
                                return Err(CommandError::already_exists("target already exists"));
                            }
                            let aggregate = target::aggregate(target_id, owner, ctx.instance_id().clone());
                            let event = TargetEvent::Added(TargetAdded { name, endpoint });
                            Ok(vec![PendingEvent::new(&aggregate, ctx.actor(), &event)?])
                        })
                    }))
                })]
            })
            .await?;

        Ok((target_id, pushed_details(&committed)?))
    }

    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn remove_target(
        &self,
        ctx: &RequestContext,
        target_id: &AggregateId,
        resource_owner: &ResourceOwner,
    ) -> CommandResult<ObjectDetails> {
        require_id(target_id.as_str(), "target id")?;

        let mut wm = TargetWriteModel::new(target_id.clone(), resource_owner.clone());
        self.load(ctx, &mut wm).await?;
        if wm.state != TargetState::Active {
            return Err(CommandError::not_found("target not found"));
        }

        let aggregate = target::aggregate(
            target_id.clone(),
            wm.base.resource_owner.clone(),
            ctx.instance_id().clone(),
        );
        let event = TargetEvent::Removed(TargetRemoved {});
        let pending = PendingEvent::new(&aggregate, ctx.actor(), &event)?;
        self.push_and_sync(ctx, &mut wm, vec![pending]).await?;
        Ok(wm.base.details())
    }

    /// Register a PEM encoded RSA or ECDSA public key on a target.
    ///
    /// Input errors (past expiration, unsupported key) are reported before
    /// the store is touched. Returns the new key id.
    #[instrument(skip(self, ctx, public_key), fields(instance = %ctx.instance_id()), err)]
    pub async fn add_target_public_key(
        &self,
        ctx: &RequestContext,
        target_id: &AggregateId,
        resource_owner: &ResourceOwner,
        public_key: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> CommandResult<(String, ObjectDetails)> {
        require_id(target_id.as_str(), "target id")?;
        if expiration.is_some_and(|e| e < Utc::now()) {
            return Err(CommandError::invalid_argument("expiration is in the past"));
        }
        let fingerprint = public_key_fingerprint(public_key.as_bytes())?;
        let key_id = self.next_id()?;
        let target_id = target_id.clone();
        let owner = resource_owner.clone();
        let public_key = public_key.to_string();

        let committed = self
            .prepare_and_push(ctx, || {
                let (key_id, target_id, owner, public_key, fingerprint) = (
                    key_id.clone(),
                    target_id.clone(),
                    owner.clone(),
                    public_key.clone(),
                    fingerprint.clone(),
                );
                vec![validation(move || {
                    Ok(create_commands(move |ctx, filter| {
                        Box::pin(async move {
                            let mut wm = TargetPublicKeysWriteModel::new(target_id.clone(), owner);
                            load_write_model(ctx, filter, &mut wm).await?;
                            if wm.state != TargetState::Active {
                                return Err(CommandError::not_found("target not found"));
                            }
                            if wm.has_fingerprint(&fingerprint) {
                                return Err(CommandError::already_exists(
                                    "public key already registered on target",
                                ));
                            }
                            let aggregate = target::aggregate(
                                target_id,
                                wm.base.resource_owner.clone(),
                                ctx.instance_id().clone(),
                            );
                            let event = TargetEvent::PublicKeyAdded(TargetPublicKeyAdded {
                                key_id,
                                public_key,
                                fingerprint,
                                expiration,
                            });
                            Ok(vec![PendingEvent::new(&aggregate, ctx.actor(), &event)?])
                        })
                    }))
                })]
            })
            .await?;

        Ok((key_id, pushed_details(&committed)?))
    }

    /// Activate a key. Activating an active key is a no-op returning the
    /// current details.
    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn activate_target_public_key(
        &self,
        ctx: &RequestContext,
        target_id: &AggregateId,
        resource_owner: &ResourceOwner,
        key_id: &str,
    ) -> CommandResult<ObjectDetails> {
        let mut wm = self.load_public_key(ctx, target_id, resource_owner, key_id).await?;
        if wm.state == PublicKeyState::Active {
            return Ok(wm.base.details());
        }
        if wm.is_expired(Utc::now()) {
            return Err(CommandError::precondition_failed("public key is expired"));
        }

        let event = TargetEvent::PublicKeyActivated(TargetPublicKeyActivated {
            key_id: key_id.to_string(),
        });
        self.push_key_event(ctx, &mut wm, event).await
    }

    /// Deactivate a key. Deactivating an inactive key is a no-op.
    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn deactivate_target_public_key(
        &self,
        ctx: &RequestContext,
        target_id: &AggregateId,
        resource_owner: &ResourceOwner,
        key_id: &str,
    ) -> CommandResult<ObjectDetails> {
        let mut wm = self.load_public_key(ctx, target_id, resource_owner, key_id).await?;
        if wm.state == PublicKeyState::Inactive {
            return Ok(wm.base.details());
        }

        let event = TargetEvent::PublicKeyDeactivated(TargetPublicKeyDeactivated {
            key_id: key_id.to_string(),
        });
        self.push_key_event(ctx, &mut wm, event).await
    }

    /// Remove an inactive key.
    #[instrument(skip(self, ctx), fields(instance = %ctx.instance_id()), err)]
    pub async fn remove_target_public_key(
        &self,
        ctx: &RequestContext,
        target_id: &AggregateId,
        resource_owner: &ResourceOwner,
        key_id: &str,
    ) -> CommandResult<ObjectDetails> {
        let mut wm = self.load_public_key(ctx, target_id, resource_owner, key_id).await?;
        if wm.state == PublicKeyState::Active {
            return Err(CommandError::precondition_failed(
                "public key is active; deactivate it first",
            ));
        }

        let event = TargetEvent::PublicKeyRemoved(TargetPublicKeyRemoved {
            key_id: key_id.to_string(),
        });
        self.push_key_event(ctx, &mut wm, event).await
    }

    /// Validate ids, load the key and require it to exist.
    async fn load_public_key(
        &self,
        ctx: &RequestContext,
        target_id: &AggregateId,
        resource_owner: &ResourceOwner,
        key_id: &str,
    ) -> CommandResult<TargetPublicKeyWriteModel> {
        require_id(target_id.as_str(), "target id")?;
        require_id(key_id, "key id")?;

        let mut wm = TargetPublicKeyWriteModel::new(target_id.clone(), resource_owner.clone(), key_id);
        self.load(ctx, &mut wm).await?;
        if !wm.exists() {
            return Err(CommandError::not_found("public key not found"));
        }
        Ok(wm)
    }

    async fn push_key_event(
        &self,
        ctx: &RequestContext,
        wm: &mut TargetPublicKeyWriteModel,
        event: TargetEvent,
    ) -> CommandResult<ObjectDetails> {
        let aggregate = target::aggregate(
            wm.base.aggregate_id.clone(),
            wm.base.resource_owner.clone(),
            ctx.instance_id().clone(),
        );
        let pending = PendingEvent::new(&aggregate, ctx.actor(), &event)?;
        self.push_and_sync(ctx, wm, vec![pending]).await?;
        Ok(wm.base.details())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_keys;
    use chrono::Duration;
    use warden_core::{ErrorKind, SequenceIdGenerator};
    use warden_infra::{InMemoryEventStore, RecordingEventStore};

    type Store = RecordingEventStore<InMemoryEventStore>;

    fn commands() -> Commands<Store> {
        Commands::new(
            RecordingEventStore::new(InMemoryEventStore::new()),
            SequenceIdGenerator::new("id"),
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::new("inst1", "admin")
    }

    fn owner() -> ResourceOwner {
        ResourceOwner::new("org1")
    }

    async fn target_with_key(commands: &Commands<Store>) -> (AggregateId, String) {
        let (target_id, _) = commands
            .add_target(&ctx(), &owner(), "webhook", "https://example.com/hook")
            .await
            .unwrap();
        let (key_id, _) = commands
            .add_target_public_key(&ctx(), &target_id, &owner(), test_keys::RSA_2048, None)
            .await
            .unwrap();
        (target_id, key_id)
    }

    #[tokio::test]
    async fn new_keys_start_inactive() {
        let commands = commands();
        let (target_id, key_id) = target_with_key(&commands).await;

        let mut wm = TargetPublicKeyWriteModel::new(target_id, owner(), key_id);
        commands.load(&ctx(), &mut wm).await.unwrap();
        assert_eq!(wm.state, PublicKeyState::Inactive);
    }

    #[tokio::test]
    async fn activating_an_active_key_pushes_nothing() {
        let commands = commands();
        let (target_id, key_id) = target_with_key(&commands).await;

        let first = commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap();
        let pushes = commands.store().push_calls();

        let second = commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap();

        assert_eq!(second, first);
        assert_eq!(commands.store().push_calls(), pushes);
    }

    #[tokio::test]
    async fn removing_an_active_key_fails_without_push() {
        let commands = commands();
        let (target_id, key_id) = target_with_key(&commands).await;
        commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap();
        let pushes = commands.store().push_calls();

        let err = commands
            .remove_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(commands.store().push_calls(), pushes);
    }

    #[tokio::test]
    async fn removed_key_cannot_be_activated() {
        let commands = commands();
        let (target_id, key_id) = target_with_key(&commands).await;

        commands
            .remove_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap();
        let err = commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn past_expiration_never_reaches_the_store() {
        let commands = commands();
        let expiration = Utc::now() - Duration::minutes(1);

        let err = commands
            .add_target_public_key(
                &ctx(),
                &AggregateId::new("t1"),
                &owner(),
                test_keys::EC_P256,
                Some(expiration),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(commands.store().untouched());
    }

    #[tokio::test]
    async fn unsupported_key_never_reaches_the_store() {
        let commands = commands();

        let err = commands
            .add_target_public_key(&ctx(), &AggregateId::new("t1"), &owner(), test_keys::ED25519, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(commands.store().untouched());
    }

    #[tokio::test]
    async fn input_errors_win_over_an_exhausted_id_generator() {
        let commands = Commands::new(
            RecordingEventStore::new(InMemoryEventStore::new()),
            SequenceIdGenerator::new("id").with_limit(0),
        );

        let err = commands
            .add_target(&ctx(), &owner(), "webhook", "ftp://example.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = commands
            .add_target_public_key(&ctx(), &AggregateId::new("t1"), &owner(), test_keys::ED25519, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = commands
            .add_target(&ctx(), &owner(), "webhook", "https://example.com/hook")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(commands.store().untouched());
    }

    #[tokio::test]
    async fn rejected_input_does_not_use_up_ids() {
        let commands = commands();
        commands.add_target(&ctx(), &owner(), " ", "https://example.com/hook").await.unwrap_err();
        commands
            .add_target_public_key(&ctx(), &AggregateId::new("t1"), &owner(), "not a key", None)
            .await
            .unwrap_err();

        let (target_id, key_id) = target_with_key(&commands).await;
        assert_eq!(target_id.as_str(), "id1");
        assert_eq!(key_id, "id2");
    }

    #[tokio::test]
    async fn stored_fingerprint_matches_the_key() {
        let commands = commands();
        let (target_id, _) = target_with_key(&commands).await;

        let mut wm = TargetPublicKeysWriteModel::new(target_id, owner());
        commands.load(&ctx(), &mut wm).await.unwrap();
        assert!(wm.has_fingerprint(test_keys::RSA_2048_FINGERPRINT));
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let commands = commands();
        let (target_id, _) = target_with_key(&commands).await;

        let err = commands
            .add_target_public_key(&ctx(), &target_id, &owner(), test_keys::RSA_2048, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn several_keys_may_be_active_at_once() {
        let commands = commands();
        let (target_id, first) = target_with_key(&commands).await;
        let (second, _) = commands
            .add_target_public_key(&ctx(), &target_id, &owner(), test_keys::EC_P384, None)
            .await
            .unwrap();

        commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), &first)
            .await
            .unwrap();
        commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), &second)
            .await
            .unwrap();

        let mut wm = TargetPublicKeysWriteModel::new(target_id, owner());
        commands.load(&ctx(), &mut wm).await.unwrap();
        assert!(wm.keys.values().all(|k| k.active));
        assert_eq!(wm.keys.len(), 2);
    }

    #[tokio::test]
    async fn key_on_missing_target_is_not_found() {
        let commands = commands();
        let err = commands
            .add_target_public_key(&ctx(), &AggregateId::new("nope"), &owner(), test_keys::EC_P256, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn expired_key_cannot_be_activated() {
        let commands = commands();
        let (target_id, _) = commands
            .add_target(&ctx(), &owner(), "webhook", "https://example.com/hook")
            .await
            .unwrap();

        // Appended directly: the command would reject an expiration this close.
        let aggregate = target::aggregate(target_id.clone(), owner(), "inst1");
        let event = TargetEvent::PublicKeyAdded(TargetPublicKeyAdded {
            key_id: "old".into(),
            public_key: test_keys::EC_P256.into(),
            fingerprint: test_keys::EC_P256_FINGERPRINT.into(),
            expiration: Some(Utc::now() - Duration::days(1)),
        });
        commands
            .store()
            .push(vec![PendingEvent::new(&aggregate, ctx().actor(), &event).unwrap()], vec![])
            .await
            .unwrap();

        let err = commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), "old")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn deactivating_an_inactive_key_pushes_nothing() {
        let commands = commands();
        let (target_id, key_id) = target_with_key(&commands).await;
        let pushes = commands.store().push_calls();

        commands
            .deactivate_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap();
        assert_eq!(commands.store().push_calls(), pushes);
    }

    #[tokio::test]
    async fn removed_target_tombstones_its_keys() {
        let commands = commands();
        let (target_id, key_id) = target_with_key(&commands).await;
        commands.remove_target(&ctx(), &target_id, &owner()).await.unwrap();

        let err = commands
            .activate_target_public_key(&ctx(), &target_id, &owner(), &key_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = commands.remove_target(&ctx(), &target_id, &owner()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn invalid_endpoint_is_rejected() {
        let commands = commands();
        let err = commands
            .add_target(&ctx(), &owner(), "webhook", "ftp://example.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(commands.store().untouched());
    }
}
