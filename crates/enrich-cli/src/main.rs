#![deny(unsafe_code)]
//! enrich-cli
//!
//! Runs one message through the full pipeline against in-memory
//! collaborators and stub inference models, then prints the resulting
//! ticket. Grounded on the teacher's `abp-daemon` bootstrap: clap for
//! args, `tracing_subscriber::EnvFilter` for logging, `anyhow` for the
//! top-level error path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use enrich_core::config::PipelineConfig;
use enrich_core::{content_hash, storage_key, Attachment, EventKind, Message};
use enrich_log::{EventLog, FileEventLog};
use enrich_orchestrator::{
    FanoutPlanner, InMemoryBroker, InMemoryTicketStore, Orchestrator, SandboxHelpDesk, TicketBuilder,
};
use enrich_retry::{FailureMetricsSink, RetryPolicy};
use enrich_stages::ml::{
    StubDamageDetector, StubDocumentFieldExtractor, StubSummarizer, StubTranscriber, StubZeroShotClassifier,
};
use enrich_stages::{
    AsrStage, ClassifyStage, DocqaSelectStage, DocqaStage, InMemoryRepository, NormalizeStage, Repository,
    SummarizeStage, VqaStage,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "enrich-cli", version, about = "Support ticket enrichment pipeline")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug-level logging for this crate and its workspace deps.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one message (with optional attachments), run it through
    /// the full pipeline, and print the resulting ticket as JSON.
    Ingest {
        /// Plain-text message body.
        #[arg(long)]
        body: Option<String>,

        /// Sender address.
        #[arg(long)]
        from: Option<String>,

        /// An attachment as `path:mime`, repeatable.
        #[arg(long = "attachment", value_name = "PATH:MIME")]
        attachments: Vec<String>,

        /// Max time to wait for the pipeline to settle into a ticket.
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("enrich=debug")
    } else {
        EnvFilter::new("enrich=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Ingest {
            body,
            from,
            attachments,
            timeout_secs,
        } => ingest(body, from, attachments, timeout_secs).await,
    }
}

async fn ingest(
    body: Option<String>,
    from: Option<String>,
    attachment_specs: Vec<String>,
    timeout_secs: u64,
) -> Result<()> {
    let config = PipelineConfig::from_env().context("load pipeline configuration")?;
    tokio::fs::create_dir_all(&config.event_log_root)
        .await
        .with_context(|| format!("create event log root {}", config.event_log_root.display()))?;

    let log: Arc<dyn EventLog> = Arc::new(FileEventLog::new(&config.event_log_root));
    let repo = Arc::new(InMemoryRepository::new());

    let message_id = Uuid::new_v4();
    let message = Message {
        id: message_id,
        source: "cli".to_string(),
        external_id: None,
        subject: None,
        from_addr: from,
        timestamp: chrono::Utc::now(),
        body_text: body,
    };
    repo.put_message(message);

    for spec in attachment_specs {
        let (path, mime) = spec
            .split_once(':')
            .with_context(|| format!("attachment spec {spec:?} must be PATH:MIME"))?;
        let path = PathBuf::from(path);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read attachment {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let attachment = Attachment {
            id: Uuid::new_v4(),
            message_id,
            storage_key: storage_key(&bytes, &filename),
            mime: mime.to_string(),
            filename,
            size_bytes: bytes.len() as u64,
            content_hash: content_hash(&bytes),
        };
        repo.put_attachment(attachment);
    }

    let repo: Arc<dyn Repository> = repo;
    let broker = Arc::new(InMemoryBroker::new());
    let metrics = Arc::new(FailureMetricsSink::new());
    let tickets = Arc::new(InMemoryTicketStore::new());

    let retry_policy = RetryPolicy::builder()
        .max_attempts(config.retry_max_attempts)
        .base_delay(config.retry_base_delay)
        .build();

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
        tickets,
        Arc::new(SandboxHelpDesk),
    ));

    let orchestrator = Orchestrator::new(
        log.clone(),
        repo,
        broker,
        metrics,
        retry_policy,
        config.settle_delay,
        fanout,
        classify,
        summarize,
        docqa_select,
        normalize,
        ticket_builder,
    );

    info!(%message_id, "ingesting message");
    orchestrator.ingest(message_id).await;

    let deadline = Duration::from_secs(timeout_secs);
    let poll_every = Duration::from_millis(250);
    let mut waited = Duration::ZERO;
    loop {
        if let Some(event) = log.latest(message_id, EventKind::TicketCreated).await? {
            println!("{}", serde_json::to_string_pretty(&event)?);
            return Ok(());
        }
        if waited >= deadline {
            bail!("pipeline did not settle into a ticket within {timeout_secs}s");
        }
        tokio::time::sleep(poll_every).await;
        waited += poll_every;
    }
}

