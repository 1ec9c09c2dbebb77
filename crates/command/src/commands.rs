//! Command entry points.
//!
//! ## Execution flow
//!
//! ```text
//! entry point (ctx, inputs)
//!   ↓
//! 1. Phase 1: validate inputs (no IO)
//!   ↓
//! 2. Phase 2: load write models, check state, build events
//!   ↓
//! 3. Push once, conditioned on everything loaded in 2
//!   ↓
//! 4. Acknowledge with the details of the last committed event
//! ```
//!
//! Single-aggregate commands may instead load one write model and use
//! [`push_and_sync`], which keeps the model current after the push.

use std::sync::Arc;

use tracing::{info, warn};

use warden_core::{IdGenerator, RequestContext};
use warden_events::{PendingEvent, StoredEvent};
use warden_infra::{EventStore, with_deadline};

use crate::config::CommandsConfig;
use crate::crypto::{SecretGenerator, SecretHasher, Sha256SecretHasher, UuidSecretGenerator};
use crate::error::{CommandError, CommandResult};
use crate::permission::{AllowAll, PermissionCheck};
use crate::preparation::{Validation, prepare_commands};
use crate::push::push_and_sync;
use crate::query_reducer::{StoreLoader, load_write_model};
use crate::write_model::WriteModel;

/// The command side of one deployment: a store plus injected collaborators.
///
/// Every entry point takes an explicit [`RequestContext`]; nothing is read
/// from process-wide state.
pub struct Commands<S> {
    pub(crate) store: S,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) config: CommandsConfig,
    pub(crate) secret_hasher: Arc<dyn SecretHasher>,
    pub(crate) secret_generator: Arc<dyn SecretGenerator>,
    pub(crate) permissions: Arc<dyn PermissionCheck>,
}

impl<S: EventStore> Commands<S> {
    pub fn new(store: S, ids: impl IdGenerator + 'static) -> Self {
        Self {
            store,
            ids: Arc::new(ids),
            config: CommandsConfig::default(),
            secret_hasher: Arc::new(Sha256SecretHasher),
            secret_generator: Arc::new(UuidSecretGenerator),
            permissions: Arc::new(AllowAll),
        }
    }

    pub fn with_config(mut self, config: CommandsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_secret_hasher(mut self, hasher: impl SecretHasher + 'static) -> Self {
        self.secret_hasher = Arc::new(hasher);
        self
    }

    pub fn with_secret_generator(mut self, generator: impl SecretGenerator + 'static) -> Self {
        self.secret_generator = Arc::new(generator);
        self
    }

    pub fn with_permission_check(mut self, permissions: impl PermissionCheck + 'static) -> Self {
        self.permissions = Arc::new(permissions);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CommandsConfig {
        &self.config
    }

    pub(crate) fn next_id(&self) -> CommandResult<String> {
        Ok(self.ids.next_id()?)
    }

    /// Load a write model from the store.
    pub async fn load<W: WriteModel + ?Sized>(&self, ctx: &RequestContext, wm: &mut W) -> CommandResult<()> {
        let loader = StoreLoader::new(&self.store);
        load_write_model(ctx, &loader, wm).await
    }

    /// See [`push_and_sync`].
    pub async fn push_and_sync<W: WriteModel + ?Sized>(
        &self,
        ctx: &RequestContext,
        wm: &mut W,
        events: Vec<PendingEvent>,
    ) -> CommandResult<Vec<StoredEvent>> {
        push_and_sync(&self.store, ctx, wm, events).await
    }

    /// Prepare the validations returned by `make_validations` and push the
    /// resulting events in one atomic call.
    ///
    /// An optimistic-concurrency rejection is retried up to
    /// `config.max_conflict_retries` times, each time with fresh validations
    /// run against a fresh load. Any other failure is returned unchanged. An
    /// empty event list is not pushed.
    pub async fn prepare_and_push<F>(
        &self,
        ctx: &RequestContext,
        make_validations: F,
    ) -> CommandResult<Vec<StoredEvent>>
    where
        F: Fn() -> Vec<Validation>,
    {
        let mut attempt = 0;
        loop {
            let loader = StoreLoader::new(&self.store);
            let events = prepare_commands(ctx, &loader, make_validations()).await?;
            if events.is_empty() {
                return Ok(vec![]);
            }
            let conditions = loader.into_conditions()?;

            match with_deadline(ctx.deadline(), self.store.push(events, conditions)).await {
                Ok(committed) => {
                    info!(events = committed.len(), attempt, "events pushed");
                    return Ok(committed);
                }
                Err(err) if err.is_concurrency() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "push rejected by concurrent write; revalidating");
                }
                Err(err) => return Err(CommandError::from(err)),
            }
        }
    }
}
