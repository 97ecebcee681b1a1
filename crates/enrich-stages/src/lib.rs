#![deny(unsafe_code)]
#![warn(missing_docs)]
//! enrich-stages
//!
//! The generic stage worker skeleton (C2) and the seven concrete
//! enrichment stages (C3).

/// Opaque inference traits and their deterministic stub implementations.
pub mod ml;
/// Entity lookup for stage inputs.
pub mod repo;
/// The seven stage implementations.
pub mod stages;
/// Shared C2 skeleton helpers.
mod worker;

pub use ml::{DamageDetector, DocumentFieldExtractor, Summarizer, Transcriber, ZeroShotClassifier};
pub use repo::{InMemoryRepository, Repository};
pub use stages::{
    AsrStage, ClassifyStage, DocqaSelectStage, DocqaStage, NormalizeStage, SummarizeStage, VqaStage,
};
