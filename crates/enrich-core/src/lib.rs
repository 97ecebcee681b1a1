// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! enrich-core
//!
//! The stable contract for the support ingestion enrichment pipeline.
//!
//! If you only take one dependency, take this one.

/// Configuration loading for pipeline-tunable knobs.
pub mod config;
/// Error catalog shared by every crate in this workspace.
pub mod error;
/// Normalized / DocQA field shapes shared between stages and the merger.
pub mod fields;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use fields::{DocFields, FieldSource, NormalizedFields};

/// Current contract version embedded in this crate's documentation and
/// used by integration tests to detect accidental breaking changes.
pub const CONTRACT_VERSION: &str = "enrich/v1";

/// An inbound artifact converted into canonical form by a collaborator
/// (mail poller, upload endpoint) before the pipeline ever sees it.
///
/// Immutable once created. `(source, external_id)` is unique when
/// `external_id` is present, which is what makes re-ingestion of the
/// same upstream item (e.g. a re-synced Gmail message) a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// Collaborator that produced this message (e.g. `"gmail"`, `"upload"`).
    pub source: String,
    /// Upstream identifier used for idempotent re-ingest, if any.
    pub external_id: Option<String>,
    /// Email subject line, if known.
    pub subject: Option<String>,
    /// Sender address, if known.
    pub from_addr: Option<String>,
    /// When the message was created (ingest time, not send time).
    pub timestamp: DateTime<Utc>,
    /// Plain-text body, if any.
    pub body_text: Option<String>,
}

/// A file attached to a [`Message`], owned by exactly one message and
/// created once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Attachment {
    /// Unique identifier for this attachment.
    pub id: Uuid,
    /// The message this attachment belongs to.
    pub message_id: Uuid,
    /// Object-store key, derived as `hex(sha256(bytes))[:8]/filename`.
    pub storage_key: String,
    /// MIME type as reported at ingest time.
    pub mime: String,
    /// Original filename.
    pub filename: String,
    /// Size of the attachment in bytes.
    pub size_bytes: u64,
    /// Full sha256 hex digest of the attachment bytes.
    pub content_hash: String,
}

impl Attachment {
    /// Returns `true` if this attachment's MIME type starts with `audio/`.
    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.mime.starts_with("audio/")
    }

    /// Returns `true` if this attachment is a PDF or an image — the two
    /// MIME families DocQA and VQA both accept.
    #[must_use]
    pub fn is_document_or_image(&self) -> bool {
        self.mime.starts_with("application/pdf") || self.mime.starts_with("image/")
    }

    /// Returns `true` if this attachment's MIME type starts with `image/`.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// Returns `true` if this attachment is a PDF.
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.mime.starts_with("application/pdf")
    }
}

/// The closed set of event types that may appear in the event log.
///
/// This is the canonical naming source: every [`EventPayload`] variant
/// corresponds to exactly one `EventKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A message (and its attachments) has been created by a collaborator.
    Ingested,
    /// The fan-out planner has dispatched per-attachment stage tasks.
    IngestedFanout,
    /// An ASR stage has produced a transcript for one attachment.
    AsrDone,
    /// A DocQA stage has produced extracted fields for one attachment.
    DocqaDone,
    /// A VQA stage has produced a damage verdict for one attachment.
    VqaDone,
    /// The classify stage has produced a route label for the message.
    ClassifyDone,
    /// The summarize stage has produced a summary for the message.
    SummaryDone,
    /// The DocQA-select stage has chosen the best DocQA result.
    DocqaSelected,
    /// The normalize stage has produced merged, provenance-tagged fields.
    NormalizeDone,
    /// A ticket has been created (or found to already exist) for the message.
    TicketCreated,
}

impl EventKind {
    /// The `SCREAMING_SNAKE_CASE` wire name for this event kind, matching
    /// `spec.md`'s closed event-type set exactly.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingested => "INGESTED",
            Self::IngestedFanout => "INGESTED_FANOUT",
            Self::AsrDone => "ASR_DONE",
            Self::DocqaDone => "DOCQA_DONE",
            Self::VqaDone => "VQA_DONE",
            Self::ClassifyDone => "CLASSIFY_DONE",
            Self::SummaryDone => "SUMMARY_DONE",
            Self::DocqaSelected => "DOCQA_SELECTED",
            Self::NormalizeDone => "NORMALIZE_DONE",
            Self::TicketCreated => "TICKET_CREATED",
        }
    }
}

/// A single dispatched fan-out task recorded in an [`EventPayload::IngestedFanout`]
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DispatchedTask {
    /// Stage name dispatched (e.g. `"asr"`, `"docqa"`, `"vqa"`).
    pub task: String,
    /// Attachment the task was dispatched for.
    pub attachment_id: Uuid,
    /// The broker's stable, deterministic task id.
    pub task_id: String,
}

/// The classification routing label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// Customer wants a refund.
    Refund,
    /// Customer reports the order never arrived.
    NotReceived,
    /// Customer is invoking a warranty claim.
    Warranty,
    /// Customer wants to change a shipping/billing address.
    AddressChange,
    /// Customer has a general "how do I" question.
    HowTo,
    /// None of the above.
    Other,
}

impl Label {
    /// All labels in the closed set `L`, in the order `spec.md` lists them.
    #[must_use]
    pub fn all() -> &'static [Label] {
        &[
            Label::Refund,
            Label::NotReceived,
            Label::Warranty,
            Label::AddressChange,
            Label::HowTo,
            Label::Other,
        ]
    }

    /// The wire string for this label (matches `EventPayload` serialization).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Refund => "refund",
            Label::NotReceived => "not_received",
            Label::Warranty => "warranty",
            Label::AddressChange => "address_change",
            Label::HowTo => "how_to",
            Label::Other => "other",
        }
    }
}

/// The structured payload of one [`Event`], tagged by [`EventKind`].
///
/// This is the typed replacement for the original implementation's
/// untyped JSON event payloads: one variant per completion-event type,
/// each carrying exactly the fields `spec.md` §4.3 specifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// `INGESTED`: a message was created.
    #[serde(rename = "INGESTED")]
    Ingested {
        /// The message that was ingested.
        message_id: Uuid,
        /// Collaborator source.
        source: String,
        /// Upstream external id, if any.
        external_id: Option<String>,
    },
    /// `INGESTED_FANOUT`: per-attachment stage tasks were dispatched.
    #[serde(rename = "INGESTED_FANOUT")]
    IngestedFanout {
        /// The message fanned out for.
        message_id: Uuid,
        /// Every task dispatched by this fan-out.
        dispatched: Vec<DispatchedTask>,
    },
    /// `ASR_DONE`: a transcript was produced for an attachment.
    #[serde(rename = "ASR_DONE")]
    AsrDone {
        /// The transcribed attachment.
        attachment_id: Uuid,
        /// The attachment's owning message.
        message_id: Uuid,
        /// Transcribed text.
        text: String,
        /// Model confidence in `[0, 1]`.
        confidence: f64,
    },
    /// `DOCQA_DONE`: fields were extracted from a document/image attachment.
    #[serde(rename = "DOCQA_DONE")]
    DocqaDone {
        /// The attachment fields were extracted from.
        attachment_id: Uuid,
        /// The attachment's owning message.
        message_id: Uuid,
        /// Extracted fields.
        fields: DocFields,
    },
    /// `VQA_DONE`: a damage verdict (or terminal non-support signal) for an
    /// attachment.
    #[serde(rename = "VQA_DONE")]
    VqaDone {
        /// The inspected attachment.
        attachment_id: Uuid,
        /// The attachment's owning message.
        message_id: Uuid,
        /// `None` when the stage could not run (unsupported MIME / PDF).
        is_damaged: Option<bool>,
        /// Terminal reason when `is_damaged` is `None`.
        reason: Option<String>,
        /// MIME type inspected, echoed for diagnostics.
        mime: String,
    },
    /// `CLASSIFY_DONE`: a route label was produced for the message.
    #[serde(rename = "CLASSIFY_DONE")]
    ClassifyDone {
        /// The classified message.
        message_id: Uuid,
        /// Winning label.
        label: Label,
        /// Per-label scores.
        scores: std::collections::BTreeMap<String, f64>,
    },
    /// `SUMMARY_DONE`: a summary was produced for the message.
    #[serde(rename = "SUMMARY_DONE")]
    SummaryDone {
        /// The summarized message.
        message_id: Uuid,
        /// Summary text.
        summary: String,
    },
    /// `DOCQA_SELECTED`: the best of possibly several DocQA results was chosen.
    #[serde(rename = "DOCQA_SELECTED")]
    DocqaSelected {
        /// The message the selection is for.
        message_id: Uuid,
        /// The attachment whose DocQA result was selected.
        attachment_id: Uuid,
        /// The selected fields.
        fields: DocFields,
    },
    /// `NORMALIZE_DONE`: merged, provenance-tagged fields for the message.
    #[serde(rename = "NORMALIZE_DONE")]
    NormalizeDone {
        /// The normalized message.
        message_id: Uuid,
        /// Merged fields.
        normalized: NormalizedFields,
    },
    /// `TICKET_CREATED`: a ticket now exists for the message.
    #[serde(rename = "TICKET_CREATED")]
    TicketCreated {
        /// The message the ticket was created for.
        message_id: Uuid,
        /// The created (or pre-existing) ticket's id.
        ticket_id: Uuid,
        /// Route label at creation time, if classify had completed.
        route: Option<Label>,
        /// Summary at creation time, if summarize had completed.
        summary: Option<String>,
        /// Normalized fields at creation time, if normalize had completed.
        normalized: Option<NormalizedFields>,
        /// Selected DocQA fields at creation time, if available.
        doc_fields: Option<DocFields>,
    },
}

impl EventPayload {
    /// The [`EventKind`] this payload's variant corresponds to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Ingested { .. } => EventKind::Ingested,
            EventPayload::IngestedFanout { .. } => EventKind::IngestedFanout,
            EventPayload::AsrDone { .. } => EventKind::AsrDone,
            EventPayload::DocqaDone { .. } => EventKind::DocqaDone,
            EventPayload::VqaDone { .. } => EventKind::VqaDone,
            EventPayload::ClassifyDone { .. } => EventKind::ClassifyDone,
            EventPayload::SummaryDone { .. } => EventKind::SummaryDone,
            EventPayload::DocqaSelected { .. } => EventKind::DocqaSelected,
            EventPayload::NormalizeDone { .. } => EventKind::NormalizeDone,
            EventPayload::TicketCreated { .. } => EventKind::TicketCreated,
        }
    }

    /// The message this payload concerns, if any (all variants carry one).
    #[must_use]
    pub fn message_id(&self) -> Uuid {
        match self {
            EventPayload::Ingested { message_id, .. }
            | EventPayload::IngestedFanout { message_id, .. }
            | EventPayload::AsrDone { message_id, .. }
            | EventPayload::DocqaDone { message_id, .. }
            | EventPayload::VqaDone { message_id, .. }
            | EventPayload::ClassifyDone { message_id, .. }
            | EventPayload::SummaryDone { message_id, .. }
            | EventPayload::DocqaSelected { message_id, .. }
            | EventPayload::NormalizeDone { message_id, .. }
            | EventPayload::TicketCreated { message_id, .. } => *message_id,
        }
    }
}

/// An append-only log entry. The single source of pipeline truth.
///
/// Events are never updated or deleted. For any `(message_id, EventKind)`
/// the effective result is the most recent event of that kind
/// ([`spec.md` §3, invariant 1]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Unique identifier for this event.
    pub id: Uuid,
    /// The ticket this event concerns, once one exists.
    pub ticket_id: Option<Uuid>,
    /// The message this event concerns.
    pub message_id: Option<Uuid>,
    /// Structured, kind-tagged payload.
    pub payload: EventPayload,
    /// Server-assigned append timestamp.
    pub timestamp: DateTime<Utc>,
}

/// A materialized help-desk ticket. Exactly one per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ticket {
    /// Unique identifier for this ticket.
    pub id: Uuid,
    /// The message this ticket was created from.
    pub message_id: Uuid,
    /// External help-desk identifier, once the help-desk collaborator
    /// has accepted the ticket.
    pub external_id: Option<String>,
    /// Lifecycle status (`"new"` at creation).
    pub status: String,
    /// Route label, if classify had completed at creation time.
    pub route: Option<Label>,
    /// Summary, if summarize had completed at creation time.
    pub summary: Option<String>,
    /// Draft reply text. Always `None` at creation; populated only by the
    /// ticket-reply workflow, which is out of scope for this pipeline.
    pub draft_reply: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-updated timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Compute the object-store key for a blob of attachment bytes, per the
/// attachment storage contract in `spec.md` §6:
/// `hex(sha256(bytes))[:8] + "/" + filename`.
#[must_use]
pub fn storage_key(data: &[u8], filename: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(data);
    let hex = format!("{digest:x}");
    format!("{}/{}", &hex[..8], filename)
}

/// Compute the full sha256 hex digest of a blob, used as `Attachment::content_hash`.
#[must_use]
pub fn content_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(data))
}
