//! `tokio::sync::Mutex`-backed implementation used by unit/property tests
//! and the CLI's quick-start mode.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enrich_core::{Event, EventKind, EventPayload};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{error::LogError, EventLog};

#[derive(Default)]
struct State {
    by_message: BTreeMap<Uuid, Vec<Event>>,
    /// Logical clock in nanoseconds, monotonic even when multiple events
    /// are appended within the same wall-clock tick under test.
    clock_nanos: i64,
}

/// An in-memory [`EventLog`]. Not durable; state is lost on process exit.
pub struct InMemoryEventLog {
    state: Mutex<State>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn next_timestamp(state: &mut State) -> DateTime<Utc> {
        let now_nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        state.clock_nanos = state.clock_nanos.max(now_nanos) + 1;
        DateTime::from_timestamp_nanos(state.clock_nanos)
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(
        &self,
        ticket_id: Option<Uuid>,
        message_id: Option<Uuid>,
        payload: EventPayload,
    ) -> Result<Event, LogError> {
        let mut state = self.state.lock().await;
        let timestamp = Self::next_timestamp(&mut state);
        let event = Event {
            id: Uuid::new_v4(),
            ticket_id,
            message_id,
            payload,
            timestamp,
        };
        let key = event.payload.message_id();
        state.by_message.entry(key).or_default().push(event.clone());
        tracing::info!(target: "enrich.log", message_id = %key, kind = ?event.payload.kind(), "event appended");
        Ok(event)
    }

    async fn latest(
        &self,
        message_id: Uuid,
        kind: EventKind,
    ) -> Result<Option<Event>, LogError> {
        let state = self.state.lock().await;
        Ok(state
            .by_message
            .get(&message_id)
            .and_then(|events| events.iter().rev().find(|e| e.payload.kind() == kind))
            .cloned())
    }

    async fn all(&self, message_id: Uuid, kind: EventKind) -> Result<Vec<Event>, LogError> {
        let state = self.state.lock().await;
        Ok(state
            .by_message
            .get(&message_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.payload.kind() == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_for_message(&self, message_id: Uuid) -> Result<Vec<Event>, LogError> {
        let state = self.state.lock().await;
        Ok(state.by_message.get(&message_id).cloned().unwrap_or_default())
    }
}
