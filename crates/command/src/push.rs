//! Push-append-reduce.

use tracing::{debug, info};

use warden_core::{ObjectDetails, RequestContext};
use warden_events::{AppendCondition, PendingEvent, StoredEvent};
use warden_infra::{EventStore, with_deadline};

use crate::error::{CommandError, CommandResult};
use crate::write_model::WriteModel;

/// Push `events` on behalf of a loaded write model, then fold the committed
/// events back into it.
///
/// The push is conditioned on nothing matching `wm.query()` having been
/// committed past the model's watermark. Afterwards the model is identical to
/// one reloaded from the store, without the extra round trip.
pub async fn push_and_sync<S, W>(
    store: &S,
    ctx: &RequestContext,
    wm: &mut W,
    events: Vec<PendingEvent>,
) -> CommandResult<Vec<StoredEvent>>
where
    S: EventStore + ?Sized,
    W: WriteModel + ?Sized,
{
    if events.is_empty() {
        return Ok(vec![]);
    }

    let query = wm.query().for_instance(ctx.instance_id().clone());
    let condition = AppendCondition::new(query.clone(), wm.base().processed_position);

    let committed = with_deadline(ctx.deadline(), store.push(events, vec![condition])).await?;
    info!(events = committed.len(), "events pushed");

    let relevant: Vec<StoredEvent> = committed.iter().filter(|e| query.matches(e)).cloned().collect();
    wm.reduce(&relevant)?;
    debug!(
        reduced = relevant.len(),
        processed_sequence = wm.base().processed_sequence,
        "write model synced"
    );

    Ok(committed)
}

/// Acknowledgement for a push: details of the last committed event.
pub fn pushed_details(events: &[StoredEvent]) -> CommandResult<ObjectDetails> {
    events
        .last()
        .map(StoredEvent::details)
        .ok_or_else(|| CommandError::internal("push returned no events"))
}
