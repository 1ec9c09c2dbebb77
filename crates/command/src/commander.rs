//! Multi-step pipelines committed as one atomic push.
//!
//! ```text
//! Commander::builder()
//!     .step(validation_1)          Phase 1 of every step runs in `validate()`,
//!     .step(validation_2)          before any IO
//!     .validate()?
//!     .build(ctx, filter).await    Phase 2 of each step, in declaration order
//!   ↓
//! Ok(events of all steps) | Err(first failure)
//! ```
//!
//! Steps may touch different aggregates. A later step sees the events of the
//! earlier steps as if they were already committed (see [`TransactionFilter`]),
//! so e.g. a user added in step 2 can be granted membership in step 3.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use warden_core::RequestContext;
use warden_events::{EventFilter, PendingEvent, StoredEvent};

use crate::error::CommandResult;
use crate::preparation::{CreateCommands, Validation};
use crate::query_reducer::FilterToQueryReducer;

/// Collects the Phase 1 closures of a pipeline.
#[derive(Default)]
pub struct CommanderBuilder {
    validations: Vec<Validation>,
}

impl CommanderBuilder {
    pub fn step(mut self, validation: Validation) -> Self {
        self.validations.push(validation);
        self
    }

    pub fn steps(mut self, validations: impl IntoIterator<Item = Validation>) -> Self {
        self.validations.extend(validations);
        self
    }

    /// Run Phase 1 of every step; the first failure is returned as is.
    pub fn validate(self) -> CommandResult<Commander> {
        let steps = self
            .validations
            .into_iter()
            .map(|validate| validate())
            .collect::<CommandResult<Vec<_>>>()?;
        Ok(Commander { steps })
    }
}

/// An ordered list of validated Phase 2 steps.
pub struct Commander {
    steps: Vec<CreateCommands>,
}

impl Commander {
    pub fn builder() -> CommanderBuilder {
        CommanderBuilder::default()
    }

    /// Pipeline over steps whose inputs were validated elsewhere.
    pub fn from_steps(steps: Vec<CreateCommands>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order.
    ///
    /// Returns the events of all steps, or the first step's error and no
    /// events at all. Nothing is pushed here.
    pub async fn build(
        self,
        ctx: &RequestContext,
        filter: &dyn FilterToQueryReducer,
    ) -> CommandResult<Vec<PendingEvent>> {
        let created_at = Utc::now();
        let mut events: Vec<PendingEvent> = Vec::new();

        for (step, create) in self.steps.into_iter().enumerate() {
            let transaction = TransactionFilter {
                inner: filter,
                pending: &events,
                created_at,
            };
            let produced = create(ctx, &transaction).await;
            match produced {
                Ok(produced) => events.extend(produced),
                Err(err) => {
                    debug!(step, error = %err, "pipeline aborted");
                    return Err(err);
                }
            }
        }

        Ok(events)
    }
}

/// Loader seen by pipeline steps: committed events from the inner loader,
/// followed by the matching events produced by earlier steps.
///
/// The earlier events are provisional (sequence and position 0), so they never
/// move a write model's watermark.
pub struct TransactionFilter<'a> {
    inner: &'a dyn FilterToQueryReducer,
    pending: &'a [PendingEvent],
    created_at: DateTime<Utc>,
}

impl<'a> TransactionFilter<'a> {
    pub fn new(inner: &'a dyn FilterToQueryReducer, pending: &'a [PendingEvent]) -> Self {
        Self {
            inner,
            pending,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl FilterToQueryReducer for TransactionFilter<'_> {
    async fn filter(&self, ctx: &RequestContext, query: EventFilter) -> CommandResult<Vec<StoredEvent>> {
        let scoped = query.clone().for_instance(ctx.instance_id().clone());
        let mut events = self.inner.filter(ctx, query).await?;
        events.extend(
            self.pending
                .iter()
                .map(|e| e.provisional(self.created_at))
                .filter(|e| scoped.matches(e)),
        );
        Ok(events)
    }
}
