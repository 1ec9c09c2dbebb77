//! Two-phase command preparation.
//!
//! Phase 1 ([`Validation`]) checks the inputs without any IO and, on success,
//! yields Phase 2 ([`CreateCommands`]): the state-dependent checks run against
//! a [`FilterToQueryReducer`], producing the events to push. Neither phase
//! pushes; the caller owns the single push.

use futures::future::BoxFuture;

use warden_core::RequestContext;
use warden_events::PendingEvent;

use crate::commander::Commander;
use crate::error::CommandResult;
use crate::query_reducer::FilterToQueryReducer;

pub type CommandsFuture<'a> = BoxFuture<'a, CommandResult<Vec<PendingEvent>>>;

/// Phase 2: load, check, and return the events to append.
pub type CreateCommands =
    Box<dyn for<'a> FnOnce(&'a RequestContext, &'a dyn FilterToQueryReducer) -> CommandsFuture<'a> + Send>;

/// Phase 1: pure input validation.
pub type Validation = Box<dyn FnOnce() -> CommandResult<CreateCommands> + Send>;

/// Box a Phase 2 closure.
///
/// ```ignore
/// create_commands(move |ctx, filter| Box::pin(async move {
///     let mut wm = TargetWriteModel::new(target_id, owner);
///     load_write_model(ctx, filter, &mut wm).await?;
///     Ok(vec![])
/// }))
/// ```
pub fn create_commands<F>(f: F) -> CreateCommands
where
    F: for<'a> FnOnce(&'a RequestContext, &'a dyn FilterToQueryReducer) -> CommandsFuture<'a>
        + Send
        + 'static,
{
    Box::new(f)
}

/// Box a Phase 1 closure.
pub fn validation<F>(f: F) -> Validation
where
    F: FnOnce() -> CommandResult<CreateCommands> + Send + 'static,
{
    Box::new(f)
}

/// Run Phase 1 of every validation, then Phase 2 of every step in order.
pub async fn prepare_commands(
    ctx: &RequestContext,
    filter: &dyn FilterToQueryReducer,
    validations: Vec<Validation>,
) -> CommandResult<Vec<PendingEvent>> {
    Commander::builder()
        .steps(validations)
        .validate()?
        .build(ctx, filter)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_core::ErrorKind;
    use warden_events::{EventFilter, StoredEvent};

    #[derive(Default)]
    struct CountingFilter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FilterToQueryReducer for CountingFilter {
        async fn filter(&self, _ctx: &RequestContext, _query: EventFilter) -> CommandResult<Vec<StoredEvent>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    fn querying_step() -> Validation {
        validation(|| {
            Ok(create_commands(|ctx, filter| {
                Box::pin(async move {
                    filter.filter(ctx, EventFilter::new()).await?;
                    Ok(vec![])
                })
            }))
        })
    }

    #[tokio::test]
    async fn phase_one_failure_skips_every_query() {
        let filter = CountingFilter::default();
        let ctx = RequestContext::new("inst1", "u1");
        let failing = validation(|| Err(CommandError::invalid_argument("name is empty")));

        let err = prepare_commands(&ctx, &filter, vec![querying_step(), failing])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(filter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn phase_two_runs_after_all_validations_pass() {
        let filter = CountingFilter::default();
        let ctx = RequestContext::new("inst1", "u1");

        let events = prepare_commands(&ctx, &filter, vec![querying_step(), querying_step()])
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(filter.calls.load(Ordering::SeqCst), 2);
    }
}
