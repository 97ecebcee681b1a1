//! Errors raised by [`crate::EventLog`] implementations. Category `L`.

/// Stable error codes for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogErrorCode {
    /// The log's backing store could not be read or written.
    StorageFailure,
    /// A stored event failed to (de)serialize.
    Corrupt,
}

impl LogErrorCode {
    /// The wire string for this code, e.g. `"ENR-L001"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogErrorCode::StorageFailure => "ENR-L001",
            LogErrorCode::Corrupt => "ENR-L002",
        }
    }
}

impl std::fmt::Display for LogErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by [`crate::EventLog`] implementations.
///
/// `append` is specified to "fail only on storage error" (`spec.md`
/// §4.1); both variants here are storage-layer failures, never
/// validation failures (those are caught by `enrich-core` types).
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The backing store (file, directory) could not be read or written.
    #[error("[{code}] event log storage failure for message {message_id}: {source}", code = LogErrorCode::StorageFailure)]
    Storage {
        /// The message whose log was being accessed.
        message_id: uuid::Uuid,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A stored event line failed to deserialize.
    #[error("[{code}] corrupt event record for message {message_id}: {source}", code = LogErrorCode::Corrupt)]
    Corrupt {
        /// The message whose log contained the bad record.
        message_id: uuid::Uuid,
        /// The underlying (de)serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl LogError {
    /// The [`LogErrorCode`] for this error variant.
    #[must_use]
    pub fn code(&self) -> LogErrorCode {
        match self {
            LogError::Storage { .. } => LogErrorCode::StorageFailure,
            LogError::Corrupt { .. } => LogErrorCode::Corrupt,
        }
    }
}
