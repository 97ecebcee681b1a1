//! Fan-out planner (C5): once a message is ingested, dispatch ASR,
//! DocQA, and VQA stage tasks for its attachments by MIME type
//! (`spec.md` §4.4). VQA also runs on every image so a damage verdict
//! is always available to the ticket builder, even though it isn't
//! part of the delayed classify/summarize/normalize chain.

use std::sync::Arc;
use std::time::Duration;

use enrich_core::{DispatchedTask, Event, EventKind, EventPayload};
use enrich_log::EventLog;
use enrich_retry::StageError;
use enrich_stages::{AsrStage, DocqaStage, Repository, VqaStage};
use uuid::Uuid;

use crate::collaborators::Broker;
use crate::task_id::attachment_task_id;

/// Dispatches per-attachment stage tasks for a newly-ingested message.
pub struct FanoutPlanner {
    log: Arc<dyn EventLog>,
    repo: Arc<dyn Repository>,
    broker: Arc<dyn Broker>,
    asr: Arc<AsrStage>,
    docqa: Arc<DocqaStage>,
    vqa: Arc<VqaStage>,
}

impl FanoutPlanner {
    /// Build a fan-out planner around its collaborators and stages.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        repo: Arc<dyn Repository>,
        broker: Arc<dyn Broker>,
        asr: Arc<AsrStage>,
        docqa: Arc<DocqaStage>,
        vqa: Arc<VqaStage>,
    ) -> Self {
        Self {
            log,
            repo,
            broker,
            asr,
            docqa,
            vqa,
        }
    }

    /// Run the fan-out for `message_id`. `Ok(None)` when the message
    /// itself doesn't exist (`spec.md` §4.2 step 2).
    pub async fn run(&self, message_id: Uuid) -> Result<Option<Event>, StageError> {
        if self.repo.get_message(message_id).await?.is_none() {
            return Ok(None);
        }

        if let Some(event) = self
            .log
            .latest(message_id, EventKind::IngestedFanout)
            .await
            .map_err(to_stage_error)?
        {
            return Ok(Some(event));
        }

        let attachments = self.repo.attachments_for_message(message_id).await?;
        let mut dispatched = Vec::with_capacity(attachments.len() * 2);

        for attachment in &attachments {
            if attachment.is_audio() {
                dispatched.push(
                    self.dispatch("asr", message_id, attachment.id, {
                        let log = self.log.clone();
                        let repo = self.repo.clone();
                        let asr = self.asr.clone();
                        let attachment_id = attachment.id;
                        Box::pin(async move {
                            if let Err(err) = asr.run(log.as_ref(), repo.as_ref(), attachment_id).await {
                                tracing::warn!(target: "enrich.orchestrator", %err, stage = "asr", "stage task failed");
                            }
                        })
                    })
                    .await,
                );
            }
            if attachment.is_document_or_image() {
                dispatched.push(
                    self.dispatch("docqa", message_id, attachment.id, {
                        let log = self.log.clone();
                        let repo = self.repo.clone();
                        let docqa = self.docqa.clone();
                        let attachment_id = attachment.id;
                        Box::pin(async move {
                            if let Err(err) = docqa.run(log.as_ref(), repo.as_ref(), attachment_id).await {
                                tracing::warn!(target: "enrich.orchestrator", %err, stage = "docqa", "stage task failed");
                            }
                        })
                    })
                    .await,
                );
            }
            if attachment.is_image() {
                dispatched.push(
                    self.dispatch("vqa", message_id, attachment.id, {
                        let log = self.log.clone();
                        let repo = self.repo.clone();
                        let vqa = self.vqa.clone();
                        let attachment_id = attachment.id;
                        Box::pin(async move {
                            if let Err(err) = vqa.run(log.as_ref(), repo.as_ref(), attachment_id).await {
                                tracing::warn!(target: "enrich.orchestrator", %err, stage = "vqa", "stage task failed");
                            }
                        })
                    })
                    .await,
                );
            }
        }

        let payload = EventPayload::IngestedFanout {
            message_id,
            dispatched,
        };
        self.log
            .append(None, Some(message_id), payload)
            .await
            .map(Some)
            .map_err(to_stage_error)
    }

    async fn dispatch(
        &self,
        stage_name: &str,
        message_id: Uuid,
        attachment_id: Uuid,
        job: futures::future::BoxFuture<'static, ()>,
    ) -> DispatchedTask {
        let task_id = attachment_task_id(message_id, stage_name, attachment_id);
        self.broker.dispatch(task_id.clone(), Duration::ZERO, job).await;
        DispatchedTask {
            task: stage_name.to_string(),
            attachment_id,
            task_id,
        }
    }
}

fn to_stage_error(err: enrich_log::LogError) -> StageError {
    StageError::Transient(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrich_core::{Attachment, Message};
    use enrich_log::InMemoryEventLog;
    use enrich_stages::ml::{StubDamageDetector, StubDocumentFieldExtractor, StubTranscriber};
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

    fn attachment(id: Uuid, message_id: Uuid, mime: &str) -> Attachment {
        Attachment {
            id,
            message_id,
            storage_key: "aabbccdd/file".into(),
            mime: mime.into(),
            filename: "file".into(),
            size_bytes: 10,
            content_hash: "deadbeef".into(),
        }
    }

    #[tokio::test]
    async fn fans_out_by_mime_and_is_idempotent() {
        let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemoryRepository::new());
        let message_id = Uuid::new_v4();
        repo.put_message(message(message_id));
        let audio_id = Uuid::new_v4();
        let image_id = Uuid::new_v4();
        repo.put_attachment(attachment(audio_id, message_id, "audio/wav"));
        repo.put_attachment(attachment(image_id, message_id, "image/png"));

        let broker = Arc::new(crate::collaborators::InMemoryBroker::new());
        let planner = FanoutPlanner::new(
            log.clone(),
            repo.clone() as Arc<dyn Repository>,
            broker,
            Arc::new(AsrStage::new(Arc::new(StubTranscriber))),
            Arc::new(DocqaStage::new(Arc::new(StubDocumentFieldExtractor))),
            Arc::new(VqaStage::new(Arc::new(StubDamageDetector))),
        );

        let event = planner.run(message_id).await.unwrap().unwrap();
        let EventPayload::IngestedFanout { dispatched, .. } = &event.payload else {
            panic!("wrong payload");
        };
        // audio -> asr only; image -> docqa + vqa
        assert_eq!(dispatched.len(), 3);

        let again = planner.run(message_id).await.unwrap().unwrap();
        assert_eq!(again.id, event.id);
    }
}
