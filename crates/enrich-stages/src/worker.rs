//! The shared C2 skeleton steps every stage in [`crate::stages`] builds
//! on: check for an existing completion event, and append a new one.
//! Loading the input entity and rejecting unsupported MIMEs stays in
//! each stage, since those checks differ per stage (`spec.md` §4.2).

use enrich_core::{Event, EventKind, EventPayload};
use enrich_log::EventLog;
use enrich_retry::StageError;
use uuid::Uuid;

fn to_stage_error(err: enrich_log::LogError) -> StageError {
    StageError::Transient(err.to_string())
}

/// Step 3: if a completion event already exists for `(message_id, kind)`,
/// return it. Attachment stages and message stages alike key this check
/// by message id only, exactly as `spec.md` §4.2 step 3 states.
pub(crate) async fn already_done(
    log: &dyn EventLog,
    message_id: Uuid,
    kind: EventKind,
) -> Result<Option<Event>, StageError> {
    log.latest(message_id, kind).await.map_err(to_stage_error)
}

/// Steps 6-7: append the completion event and commit.
pub(crate) async fn append_done(
    log: &dyn EventLog,
    message_id: Uuid,
    payload: EventPayload,
) -> Result<Event, StageError> {
    log.append(None, Some(message_id), payload)
        .await
        .map_err(to_stage_error)
}

/// Fetch the latest event of `kind` for `message_id`, if any.
pub(crate) async fn latest(
    log: &dyn EventLog,
    message_id: Uuid,
    kind: EventKind,
) -> Result<Option<Event>, StageError> {
    log.latest(message_id, kind).await.map_err(to_stage_error)
}

/// Fetch every event of `kind` for `message_id`, in append order.
pub(crate) async fn all(
    log: &dyn EventLog,
    message_id: Uuid,
    kind: EventKind,
) -> Result<Vec<Event>, StageError> {
    log.all(message_id, kind).await.map_err(to_stage_error)
}
