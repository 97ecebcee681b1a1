#![deny(unsafe_code)]
#![warn(missing_docs)]
//! enrich-log
//!
//! The append-only event log (C1): the pipeline's single source of
//! truth and idempotence oracle. Every stage worker and the
//! orchestrator go through the [`EventLog`] trait; nothing else touches
//! storage directly.

/// Error types for this crate.
pub mod error;
/// `FileEventLog`: a durable, JSON-lines-per-message implementation.
pub mod file;
/// `InMemoryEventLog`: a `tokio::sync::Mutex`-backed implementation for
/// tests and quick-start runs.
pub mod memory;

pub use error::{LogError, LogErrorCode};
pub use file::FileEventLog;
pub use memory::InMemoryEventLog;

use async_trait::async_trait;
use enrich_core::{Event, EventKind, EventPayload};
use uuid::Uuid;

/// The event log contract (C1). Both implementations in this crate
/// satisfy the monotonicity and idempotence invariants from `spec.md`
/// §3 and §8: timestamps for a given message are non-decreasing in
/// append order, and `append` never fails except on storage error.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Atomically append an event with a server-assigned timestamp.
    /// Fails only on storage error.
    async fn append(
        &self,
        ticket_id: Option<Uuid>,
        message_id: Option<Uuid>,
        payload: EventPayload,
    ) -> Result<Event, LogError>;

    /// Return the most recently appended event of `kind` for `message_id`,
    /// or `None` if no such event has been appended.
    async fn latest(
        &self,
        message_id: Uuid,
        kind: EventKind,
    ) -> Result<Option<Event>, LogError>;

    /// Return every event of `kind` for `message_id`, in append order.
    async fn all(&self, message_id: Uuid, kind: EventKind) -> Result<Vec<Event>, LogError>;

    /// Return every event for `message_id` regardless of kind, in append
    /// order. Used by the ticket builder and by tests asserting exact
    /// event counts.
    async fn all_for_message(&self, message_id: Uuid) -> Result<Vec<Event>, LogError>;
}

#[cfg(test)]
mod contract_tests {
    use super::*;
    use enrich_core::EventKind;

    async fn exercise(log: &dyn EventLog) {
        let message_id = Uuid::new_v4();
        assert!(log.latest(message_id, EventKind::Ingested).await.unwrap().is_none());

        let first = log
            .append(
                None,
                Some(message_id),
                EventPayload::Ingested {
                    message_id,
                    source: "upload".into(),
                    external_id: None,
                },
            )
            .await
            .unwrap();

        let second = log
            .append(
                None,
                Some(message_id),
                EventPayload::ClassifyDone {
                    message_id,
                    label: enrich_core::Label::Other,
                    scores: Default::default(),
                },
            )
            .await
            .unwrap();

        assert!(first.timestamp <= second.timestamp);

        let latest = log
            .latest(message_id, EventKind::Ingested)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, first.id);

        let all = log.all_for_message(message_id).await.unwrap();
        assert_eq!(all.len(), 2);

        // idempotence surface: re-appending the same kind keeps `all`
        // growing, but `latest` always reflects the most recent one.
        let third = log
            .append(
                None,
                Some(message_id),
                EventPayload::ClassifyDone {
                    message_id,
                    label: enrich_core::Label::Refund,
                    scores: Default::default(),
                },
            )
            .await
            .unwrap();
        let latest_classify = log
            .latest(message_id, EventKind::ClassifyDone)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest_classify.id, third.id);
    }

    #[tokio::test]
    async fn in_memory_satisfies_contract() {
        exercise(&InMemoryEventLog::new()).await;
    }

    #[tokio::test]
    async fn file_backed_satisfies_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileEventLog::new(dir.path())).await;
    }
}
