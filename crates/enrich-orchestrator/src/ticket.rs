//! Aggregator / ticket builder (C6): joins whatever enrichment has
//! completed into a ticket, read-before-insert idempotent
//! (`spec.md` §4.6). Any of classify, summarize, normalize, and
//! DocQA-select may still be missing when this runs; absence is not
//! an error.

use std::sync::Arc;

use chrono::Utc;
use enrich_core::{Event, EventKind, EventPayload, Ticket};
use enrich_log::EventLog;
use enrich_retry::StageError;
use enrich_stages::Repository;
use uuid::Uuid;

use crate::collaborators::HelpDesk;
use crate::tickets::TicketStore;

/// Builds (or finds) the ticket for a message from whatever enrichment
/// events are available.
pub struct TicketBuilder {
    log: Arc<dyn EventLog>,
    repo: Arc<dyn Repository>,
    tickets: Arc<dyn TicketStore>,
    helpdesk: Arc<dyn HelpDesk>,
}

impl TicketBuilder {
    /// Build a ticket builder around its collaborators.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        repo: Arc<dyn Repository>,
        tickets: Arc<dyn TicketStore>,
        helpdesk: Arc<dyn HelpDesk>,
    ) -> Self {
        Self {
            log,
            repo,
            tickets,
            helpdesk,
        }
    }

    /// Run ticket creation for `message_id`. `Ok(None)` when the message
    /// itself doesn't exist.
    pub async fn run(&self, message_id: Uuid) -> Result<Option<Event>, StageError> {
        if self.repo.get_message(message_id).await?.is_none() {
            return Ok(None);
        }

        if let Some(event) = self
            .log
            .latest(message_id, EventKind::TicketCreated)
            .await
            .map_err(to_stage_error)?
        {
            return Ok(Some(event));
        }

        if let Some(existing) = self.tickets.get_by_message(message_id).await? {
            let payload = EventPayload::TicketCreated {
                message_id,
                ticket_id: existing.id,
                route: existing.route,
                summary: existing.summary,
                normalized: None,
                doc_fields: None,
            };
            return self
                .log
                .append(Some(existing.id), Some(message_id), payload)
                .await
                .map(Some)
                .map_err(to_stage_error);
        }

        let route = match latest(self.log.as_ref(), message_id, EventKind::ClassifyDone).await? {
            Some(Event {
                payload: EventPayload::ClassifyDone { label, .. },
                ..
            }) => Some(label),
            _ => None,
        };
        let summary = match latest(self.log.as_ref(), message_id, EventKind::SummaryDone).await? {
            Some(Event {
                payload: EventPayload::SummaryDone { summary, .. },
                ..
            }) => Some(summary),
            _ => None,
        };
        let normalized = match latest(self.log.as_ref(), message_id, EventKind::NormalizeDone).await? {
            Some(Event {
                payload: EventPayload::NormalizeDone { normalized, .. },
                ..
            }) => Some(normalized),
            _ => None,
        };
        let doc_fields = match latest(self.log.as_ref(), message_id, EventKind::DocqaSelected).await? {
            Some(Event {
                payload: EventPayload::DocqaSelected { fields, .. },
                ..
            }) => Some(fields),
            _ => None,
        };

        let now = Utc::now();
        let ticket_id = Uuid::new_v4();
        let ticket = Ticket {
            id: ticket_id,
            message_id,
            external_id: None,
            status: "new".to_string(),
            route,
            summary: summary.clone(),
            draft_reply: None,
            created_at: now,
            updated_at: now,
        };
        self.tickets.insert(ticket).await?;

        match self.helpdesk.create_ticket(ticket_id, summary.as_deref()).await {
            Ok(external_id) => {
                tracing::info!(target: "enrich.orchestrator", %ticket_id, external_id, "help desk ticket created");
            }
            Err(err) => {
                tracing::warn!(target: "enrich.orchestrator", %ticket_id, %err, "help desk ticket creation failed");
            }
        }

        let payload = EventPayload::TicketCreated {
            message_id,
            ticket_id,
            route,
            summary,
            normalized,
            doc_fields,
        };
        self.log
            .append(Some(ticket_id), Some(message_id), payload)
            .await
            .map(Some)
            .map_err(to_stage_error)
    }
}

async fn latest(log: &dyn EventLog, message_id: Uuid, kind: EventKind) -> Result<Option<Event>, StageError> {
    log.latest(message_id, kind).await.map_err(to_stage_error)
}

fn to_stage_error(err: enrich_log::LogError) -> StageError {
    StageError::Transient(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SandboxHelpDesk;
    use crate::tickets::InMemoryTicketStore;
    use enrich_core::{Label, Message};
    use enrich_log::InMemoryEventLog;
    use enrich_stages::InMemoryRepository;

    fn message(id: Uuid) -> Message {
        Message {
            id,
            source: "upload".into(),
            external_id: None,
            subject: None,
            from_addr: None,
            timestamp: chrono::Utc::now(),
            body_text: Some("hello".into()),
        }
    }

    #[tokio::test]
    async fn creates_ticket_once_and_joins_available_enrichment() {
        let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemoryRepository::new());
        let message_id = Uuid::new_v4();
        repo.put_message(message(message_id));

        log.append(
            None,
            Some(message_id),
            EventPayload::ClassifyDone {
                message_id,
                label: Label::Refund,
                scores: Default::default(),
            },
        )
        .await
        .unwrap();

        let tickets = Arc::new(InMemoryTicketStore::new());
        let builder = TicketBuilder::new(
            log.clone(),
            repo as Arc<dyn Repository>,
            tickets.clone(),
            Arc::new(SandboxHelpDesk),
        );

        let first = builder.run(message_id).await.unwrap().unwrap();
        let EventPayload::TicketCreated { route, ticket_id, .. } = &first.payload else {
            panic!("wrong payload");
        };
        assert_eq!(*route, Some(Label::Refund));

        let again = builder.run(message_id).await.unwrap().unwrap();
        let EventPayload::TicketCreated { ticket_id: ticket_id_2, .. } = &again.payload else {
            panic!("wrong payload");
        };
        assert_eq!(ticket_id, ticket_id_2);

        assert!(tickets.get_by_message(message_id).await.unwrap().is_some());
    }
}
