//! The stage error taxonomy (`spec.md` §4.8, §9 glossary).

/// How a stage invocation failed, classified so the caller knows whether
/// to retry, record a terminal event, or silently return `None`.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// No row exists for the given id. No retry, no event; the caller
    /// returns `None`.
    #[error("input not found: {0}")]
    NotFound(String),

    /// The attachment's MIME type is not supported by this stage. For
    /// VQA this becomes a terminal event (`is_damaged: null`); for
    /// ASR/DocQA the caller returns `None` silently.
    #[error("unsupported mime: {0}")]
    Unsupported(String),

    /// A transient infrastructure failure (storage, DB, model
    /// invocation). Retried with the configured backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A permanent content error (malformed bytes). Treated as
    /// transient until the retry budget is exhausted; after exhaustion
    /// the stage remains unrecorded.
    #[error("permanent content error: {0}")]
    Permanent(String),

    /// A duplicate ticket was about to be created. Resolved by
    /// read-before-insert in the aggregator, not by retrying here.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StageError {
    /// `true` if this error should be retried by [`crate::RetryPolicy`].
    ///
    /// `NotFound`, `Unsupported`, and `Conflict` are handled by the
    /// caller directly and never reach the retry loop in practice, but
    /// the classification is total so a future caller can rely on it.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Transient(_) | StageError::Permanent(_))
    }

    /// The metrics step label for this error's category.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            StageError::NotFound(_) => "not_found",
            StageError::Unsupported(_) => "unsupported",
            StageError::Transient(_) => "transient",
            StageError::Permanent(_) => "permanent",
            StageError::Conflict(_) => "conflict",
        }
    }
}
