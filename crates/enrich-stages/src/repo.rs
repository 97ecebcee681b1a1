//! Entity lookup for stage inputs (`spec.md` §4.2 step 2: "load the
//! input entity... if missing, return null with no event"). A thin
//! collaborator trait, not a database: the real message/attachment
//! store lives outside this repository's scope, same as `ObjectStore`
//! and `Broker` in `enrich-orchestrator`.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use enrich_core::{Attachment, Message};
use enrich_retry::StageError;
use uuid::Uuid;

/// Read access to messages and their attachments.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Load a message by id. `Ok(None)` means no row exists (`spec.md`
    /// §4.8 "input missing": the caller returns null, no retry).
    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, StageError>;

    /// Load an attachment by id.
    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>, StageError>;

    /// Every attachment belonging to `message_id`, in the order they
    /// were added.
    async fn attachments_for_message(&self, message_id: Uuid) -> Result<Vec<Attachment>, StageError>;
}

/// An in-memory [`Repository`] for tests and the CLI's quick-start mode.
#[derive(Default)]
pub struct InMemoryRepository {
    messages: Mutex<HashMap<Uuid, Message>>,
    attachments: Mutex<HashMap<Uuid, Attachment>>,
    /// Attachment ids per message, in insertion order, so
    /// `attachments_for_message` can honor its ordering guarantee
    /// without relying on `HashMap` iteration order.
    attachment_order: Mutex<BTreeMap<Uuid, Vec<Uuid>>>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a message.
    pub fn put_message(&self, message: Message) {
        self.messages
            .lock()
            .expect("repository mutex poisoned")
            .insert(message.id, message);
    }

    /// Insert or replace an attachment.
    pub fn put_attachment(&self, attachment: Attachment) {
        let message_id = attachment.message_id;
        let attachment_id = attachment.id;
        let is_new = !self
            .attachments
            .lock()
            .expect("repository mutex poisoned")
            .contains_key(&attachment_id);
        self.attachments
            .lock()
            .expect("repository mutex poisoned")
            .insert(attachment_id, attachment);
        if is_new {
            self.attachment_order
                .lock()
                .expect("repository mutex poisoned")
                .entry(message_id)
                .or_default()
                .push(attachment_id);
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, StageError> {
        Ok(self
            .messages
            .lock()
            .expect("repository mutex poisoned")
            .get(&id)
            .cloned())
    }

    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>, StageError> {
        Ok(self
            .attachments
            .lock()
            .expect("repository mutex poisoned")
            .get(&id)
            .cloned())
    }

    async fn attachments_for_message(&self, message_id: Uuid) -> Result<Vec<Attachment>, StageError> {
        let order = self
            .attachment_order
            .lock()
            .expect("repository mutex poisoned")
            .get(&message_id)
            .cloned()
            .unwrap_or_default();
        let attachments = self.attachments.lock().expect("repository mutex poisoned");
        Ok(order.iter().filter_map(|id| attachments.get(id).cloned()).collect())
    }
}
