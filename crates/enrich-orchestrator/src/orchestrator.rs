//! Orchestrator (C4): the single entry point a collaborator calls once
//! a message has been ingested. Dispatches every downstream task
//! through the [`Broker`], soft-barrier-delayed so inference stages
//! that read another stage's output (classify reading ASR, normalize
//! reading DocQA-select) have a chance to land first
//! (`spec.md` §4.4).

use std::sync::Arc;
use std::time::Duration;

use enrich_retry::{FailureMetricsSink, RetryPolicy, StageError};
use enrich_stages::{ClassifyStage, DocqaSelectStage, NormalizeStage, Repository, SummarizeStage};
use uuid::Uuid;

use crate::collaborators::Broker;
use crate::fanout::FanoutPlanner;
use crate::task_id::message_task_id;
use crate::ticket::TicketBuilder;

/// Multiplier applied to [`Orchestrator`]'s `settle_delay` for each
/// dispatch, preserving `spec.md` §4.4's default 5/5/15/20/25s chain
/// when `settle_delay` is the default 5s.
const CLASSIFY_DELAY_UNITS: u32 = 1;
const SUMMARIZE_DELAY_UNITS: u32 = 1;
const DOCQA_SELECT_DELAY_UNITS: u32 = 3;
const NORMALIZE_DELAY_UNITS: u32 = 4;
const CREATE_TICKET_DELAY_UNITS: u32 = 5;

/// Drives a single message through every downstream stage task.
pub struct Orchestrator {
    repo: Arc<dyn Repository>,
    broker: Arc<dyn Broker>,
    metrics: Arc<FailureMetricsSink>,
    retry_policy: RetryPolicy,
    settle_delay: Duration,
    fanout: Arc<FanoutPlanner>,
    classify: Arc<ClassifyStage>,
    summarize: Arc<SummarizeStage>,
    docqa_select: Arc<DocqaSelectStage>,
    normalize: Arc<NormalizeStage>,
    ticket_builder: Arc<TicketBuilder>,
    log: Arc<dyn enrich_log::EventLog>,
}

impl Orchestrator {
    /// Build an orchestrator around its stage workers and collaborators.
    /// `settle_delay` is the soft-barrier base unit (`ENRICH_SETTLE_DELAY_SECS`).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        log: Arc<dyn enrich_log::EventLog>,
        repo: Arc<dyn Repository>,
        broker: Arc<dyn Broker>,
        metrics: Arc<FailureMetricsSink>,
        retry_policy: RetryPolicy,
        settle_delay: Duration,
        fanout: Arc<FanoutPlanner>,
        classify: Arc<ClassifyStage>,
        summarize: Arc<SummarizeStage>,
        docqa_select: Arc<DocqaSelectStage>,
        normalize: Arc<NormalizeStage>,
        ticket_builder: Arc<TicketBuilder>,
    ) -> Self {
        Self {
            log,
            repo,
            broker,
            metrics,
            retry_policy,
            settle_delay,
            fanout,
            classify,
            summarize,
            docqa_select,
            normalize,
            ticket_builder,
        }
    }

    /// Dispatch every downstream task for `message_id`. Safe to call
    /// more than once: every task id is stable, so the broker's own
    /// dedup makes re-ingestion a no-op.
    pub async fn ingest(&self, message_id: Uuid) {
        self.dispatch_fanout(message_id).await;
        self.dispatch_classify(message_id).await;
        self.dispatch_summarize(message_id).await;
        self.dispatch_docqa_select(message_id).await;
        self.dispatch_normalize(message_id).await;
        self.dispatch_create_ticket(message_id).await;
    }

    async fn dispatch_fanout(&self, message_id: Uuid) {
        let task_id = message_task_id(message_id, "ingested");
        let fanout = self.fanout.clone();
        let metrics = self.metrics.clone();
        let job = Box::pin(async move {
            if let Err(err) = fanout.run(message_id).await {
                metrics.record_failure("ingested_fanout");
                tracing::warn!(target: "enrich.orchestrator", %err, stage = "ingested_fanout", "stage task failed");
            }
        });
        self.broker.dispatch(task_id, Duration::ZERO, job).await;
    }

    async fn dispatch_classify(&self, message_id: Uuid) {
        let task_id = message_task_id(message_id, "classify");
        let log = self.log.clone();
        let repo = self.repo.clone();
        let stage = self.classify.clone();
        let metrics = self.metrics.clone();
        let retry_policy = self.retry_policy;
        let job = Box::pin(async move {
            run_retried("classify", &retry_policy, &metrics, || {
                let log = log.clone();
                let repo = repo.clone();
                let stage = stage.clone();
                async move { stage.run(log.as_ref(), repo.as_ref(), message_id).await }
            })
            .await;
        });
        self.broker.dispatch(task_id, self.settle_delay * CLASSIFY_DELAY_UNITS, job).await;
    }

    async fn dispatch_summarize(&self, message_id: Uuid) {
        let task_id = message_task_id(message_id, "summarize");
        let log = self.log.clone();
        let repo = self.repo.clone();
        let stage = self.summarize.clone();
        let metrics = self.metrics.clone();
        let retry_policy = self.retry_policy;
        let job = Box::pin(async move {
            run_retried("summarize", &retry_policy, &metrics, || {
                let log = log.clone();
                let repo = repo.clone();
                let stage = stage.clone();
                async move { stage.run(log.as_ref(), repo.as_ref(), message_id).await }
            })
            .await;
        });
        self.broker.dispatch(task_id, self.settle_delay * SUMMARIZE_DELAY_UNITS, job).await;
    }

    async fn dispatch_docqa_select(&self, message_id: Uuid) {
        let task_id = message_task_id(message_id, "docqa_select");
        let log = self.log.clone();
        let repo = self.repo.clone();
        let stage = self.docqa_select.clone();
        let metrics = self.metrics.clone();
        let retry_policy = self.retry_policy;
        let job = Box::pin(async move {
            run_retried("docqa_select", &retry_policy, &metrics, || {
                let log = log.clone();
                let repo = repo.clone();
                let stage = stage.clone();
                async move { stage.run(log.as_ref(), repo.as_ref(), message_id).await }
            })
            .await;
        });
        self.broker.dispatch(task_id, self.settle_delay * DOCQA_SELECT_DELAY_UNITS, job).await;
    }

    async fn dispatch_normalize(&self, message_id: Uuid) {
        let task_id = message_task_id(message_id, "normalize");
        let log = self.log.clone();
        let repo = self.repo.clone();
        let stage = self.normalize.clone();
        let metrics = self.metrics.clone();
        let retry_policy = self.retry_policy;
        let job = Box::pin(async move {
            run_retried("normalize", &retry_policy, &metrics, || {
                let log = log.clone();
                let repo = repo.clone();
                let stage = stage.clone();
                async move { stage.run(log.as_ref(), repo.as_ref(), message_id).await }
            })
            .await;
        });
        self.broker.dispatch(task_id, self.settle_delay * NORMALIZE_DELAY_UNITS, job).await;
    }

    async fn dispatch_create_ticket(&self, message_id: Uuid) {
        let task_id = message_task_id(message_id, "ticket");
        let builder = self.ticket_builder.clone();
        let metrics = self.metrics.clone();
        let job = Box::pin(async move {
            if let Err(err) = builder.run(message_id).await {
                metrics.record_failure("create_ticket");
                tracing::warn!(target: "enrich.orchestrator", %err, stage = "create_ticket", "stage task failed");
            }
        });
        self.broker
            .dispatch(task_id, self.settle_delay * CREATE_TICKET_DELAY_UNITS, job)
            .await;
    }
}

async fn run_retried<F, Fut, T>(step: &str, policy: &RetryPolicy, metrics: &FailureMetricsSink, attempt: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StageError>>,
{
    if let Err(err) = policy.run(step, metrics, attempt).await {
        tracing::warn!(target: "enrich.orchestrator", %err, stage = step, "stage task failed after retries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryBroker, SandboxHelpDesk};
    use crate::tickets::InMemoryTicketStore;
    use enrich_core::{Attachment, Message};
    use enrich_log::{EventLog, InMemoryEventLog};
    use enrich_stages::ml::{
        StubDamageDetector, StubDocumentFieldExtractor, StubSummarizer, StubTranscriber,
        StubZeroShotClassifier,
    };
    use enrich_stages::{AsrStage, DocqaStage, InMemoryRepository, VqaStage};

    fn message(id: Uuid) -> Message {
        Message {
            id,
            source: "upload".into(),
            external_id: None,
            subject: None,
            from_addr: None,
            timestamp: chrono::Utc::now(),
            body_text: Some("my order never arrived, please refund".into()),
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
            content_hash: "0123456789abcdef".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_pipeline_settles_into_a_ticket() {
        let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let repo = Arc::new(InMemoryRepository::new());
        let message_id = Uuid::new_v4();
        repo.put_message(message(message_id));
        repo.put_attachment(attachment(Uuid::new_v4(), message_id, "image/png"));
        let repo: Arc<dyn Repository> = repo;

        let broker = Arc::new(InMemoryBroker::new());
        let metrics = Arc::new(FailureMetricsSink::new());
        let tickets = Arc::new(InMemoryTicketStore::new());

        let fanout = Arc::new(FanoutPlanner::new(
            log.clone(),
            repo.clone(),
            broker.clone(),
            Arc::new(AsrStage::new(Arc::new(StubTranscriber))),
            Arc::new(DocqaStage::new(Arc::new(StubDocumentFieldExtractor))),
            Arc::new(VqaStage::new(Arc::new(StubDamageDetector))),
        ));
        let classify = Arc::new(ClassifyStage::new(Arc::new(StubZeroShotClassifier)));
        let summarize = Arc::new(SummarizeStage::new(Arc::new(StubSummarizer)));
        let docqa_select = Arc::new(DocqaSelectStage);
        let normalize = Arc::new(NormalizeStage);
        let ticket_builder = Arc::new(TicketBuilder::new(
            log.clone(),
            repo.clone(),
            tickets.clone(),
            Arc::new(SandboxHelpDesk),
        ));

        let orchestrator = Orchestrator::new(
            log.clone(),
            repo,
            broker,
            metrics,
            RetryPolicy::default(),
            Duration::from_secs(5),
            fanout,
            classify,
            summarize,
            docqa_select,
            normalize,
            ticket_builder,
        );

        orchestrator.ingest(message_id).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;

        let ticket = tickets.get_by_message(message_id).await.unwrap();
        assert!(ticket.is_some());
    }
}
