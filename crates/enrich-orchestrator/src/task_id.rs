//! Deterministic task id construction (`spec.md` §4.4): stable across
//! re-dispatch so retries are idempotent at the broker level, matching
//! the event log's own `(message_id, EventKind)` idempotence key.

use uuid::Uuid;

/// A task id scoped to a whole message, e.g. `"<message_id>:classify"`.
#[must_use]
pub fn message_task_id(message_id: Uuid, stage: &str) -> String {
    format!("{message_id}:{stage}")
}

/// A task id scoped to one attachment of a message, e.g.
/// `"<message_id>:asr:<attachment_id>"`.
#[must_use]
pub fn attachment_task_id(message_id: Uuid, stage: &str, attachment_id: Uuid) -> String {
    format!("{message_id}:{stage}:{attachment_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_deterministic() {
        let message_id = Uuid::new_v4();
        assert_eq!(
            message_task_id(message_id, "classify"),
            message_task_id(message_id, "classify")
        );
        let attachment_id = Uuid::new_v4();
        assert_eq!(
            attachment_task_id(message_id, "asr", attachment_id),
            attachment_task_id(message_id, "asr", attachment_id)
        );
        assert_ne!(
            attachment_task_id(message_id, "asr", attachment_id),
            attachment_task_id(message_id, "docqa", attachment_id)
        );
    }
}
