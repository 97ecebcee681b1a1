//! Ticket storage for the aggregator (C6). A thin collaborator trait,
//! not a database, same spirit as `enrich_stages::repo::Repository`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use enrich_core::Ticket;
use enrich_retry::StageError;
use uuid::Uuid;

/// Read/insert access to materialized tickets, one per message.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// The ticket for `message_id`, if one has already been created.
    async fn get_by_message(&self, message_id: Uuid) -> Result<Option<Ticket>, StageError>;

    /// Insert a newly created ticket. Callers must have already checked
    /// [`TicketStore::get_by_message`] to keep ticket creation idempotent
    /// (`spec.md` §4.6: "exactly one ticket per message").
    async fn insert(&self, ticket: Ticket) -> Result<(), StageError>;
}

/// An in-memory [`TicketStore`] for tests and the CLI's quick-start mode.
#[derive(Default)]
pub struct InMemoryTicketStore {
    by_message: Mutex<HashMap<Uuid, Ticket>>,
}

impl InMemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get_by_message(&self, message_id: Uuid) -> Result<Option<Ticket>, StageError> {
        Ok(self
            .by_message
            .lock()
            .expect("ticket store mutex poisoned")
            .get(&message_id)
            .cloned())
    }

    async fn insert(&self, ticket: Ticket) -> Result<(), StageError> {
        self.by_message
            .lock()
            .expect("ticket store mutex poisoned")
            .insert(ticket.message_id, ticket);
        Ok(())
    }
}
