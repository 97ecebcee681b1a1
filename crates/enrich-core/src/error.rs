//! Error catalog shared by every crate in this workspace.
//!
//! Codes are grouped by category letter:
//!   - `C` — contract / data shape errors (this module)
//!   - `S` — stage execution errors (see `enrich-stages`)
//!   - `L` — event log errors (see `enrich-log`)

use serde::{Deserialize, Serialize};

/// Stable, documented error codes. Serialized as the wire string
/// (`"ENR-C001"`, ...) so a `Display` impl and a serde impl agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A `Message` or `Attachment` failed schema validation.
    MalformedRecord,
    /// An `Event` payload's `type` tag did not match a known `EventKind`.
    UnknownEventType,
    /// A numeric field (amount, confidence) was out of its valid range.
    FieldOutOfRange,
    /// A referenced id (message, attachment, ticket) does not exist.
    UnknownReference,
}

impl ErrorCode {
    /// The wire string for this code, e.g. `"ENR-C001"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MalformedRecord => "ENR-C001",
            ErrorCode::UnknownEventType => "ENR-C002",
            ErrorCode::FieldOutOfRange => "ENR-C003",
            ErrorCode::UnknownReference => "ENR-C004",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by `enrich-core`'s own validation helpers.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// A required field was missing or empty.
    #[error("[{code}] missing required field `{field}`", code = ErrorCode::MalformedRecord)]
    MissingField {
        /// The field that was missing.
        field: &'static str,
    },

    /// A confidence value was outside `[0, 1]`.
    #[error("[{code}] confidence for `{field}` out of range: {value}", code = ErrorCode::FieldOutOfRange)]
    ConfidenceOutOfRange {
        /// The field the confidence belongs to.
        field: String,
        /// The offending value.
        value: f64,
    },

    /// An amount was negative.
    #[error("[{code}] amount must be non-negative, got {value}", code = ErrorCode::FieldOutOfRange)]
    NegativeAmount {
        /// The offending value.
        value: rust_decimal::Decimal,
    },
}

impl ContractError {
    /// The [`ErrorCode`] for this error variant.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ContractError::MissingField { .. } => ErrorCode::MalformedRecord,
            ContractError::ConfidenceOutOfRange { .. } | ContractError::NegativeAmount { .. } => {
                ErrorCode::FieldOutOfRange
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(ErrorCode::MalformedRecord.as_str(), "ENR-C001");
        assert_eq!(ErrorCode::UnknownReference.as_str(), "ENR-C004");
    }
}
