#![deny(unsafe_code)]
#![warn(missing_docs)]
//! enrich-retry
//!
//! The failure taxonomy and retry/backoff policy shared by every stage
//! worker (C8).

mod metrics;
mod policy;
mod taxonomy;

pub use metrics::FailureMetricsSink;
pub use policy::{BackoffKind, RetryPolicy, RetryPolicyBuilder, TimeoutConfig};
pub use taxonomy::StageError;
