//! Opaque inference traits the in-scope stages depend on. One async
//! method each, satisfying the non-goal that the ML models themselves
//! stay out of scope: a real model client implements the same trait and
//! drops in without touching stage logic.

mod stub;

pub use stub::{
    StubDamageDetector, StubDocumentFieldExtractor, StubSummarizer, StubTranscriber,
    StubZeroShotClassifier, TemplateSummarizer,
};

use async_trait::async_trait;
use enrich_core::{DocFields, Label};
use std::collections::BTreeMap;

use enrich_core::Attachment;

/// Produces a transcript for an audio attachment (ASR).
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `attachment`, returning the text and a confidence in
    /// `[0, 1]`.
    async fn transcribe(&self, attachment: &Attachment) -> (String, f64);
}

/// Extracts order fields from a document or image attachment (DocQA).
#[async_trait]
pub trait DocumentFieldExtractor: Send + Sync {
    /// Extract whatever order fields can be found in `attachment`.
    async fn extract(&self, attachment: &Attachment) -> DocFields;
}

/// Detects visible damage in a photo attachment (VQA).
#[async_trait]
pub trait DamageDetector: Send + Sync {
    /// `true` if `attachment` shows visible damage.
    async fn is_damaged(&self, attachment: &Attachment) -> bool;
}

/// Assigns a routing label to message text (Classify).
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    /// Classify `text` against the closed label set, returning the
    /// winning label and every label's score.
    async fn classify(&self, text: &str) -> (Label, BTreeMap<String, f64>);
}

/// Produces a short summary of message text (Summarize).
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text`.
    async fn summarize(&self, text: &str) -> String;
}
