// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for the FirewallDB action ledger.
//
// Two enums: `CodecError` for record encoding/decoding failures and
// `ActionStoreError` for everything the action store reports to its callers.
// Callers that need a coarse classification (e.g. to map onto a transport
// status code) use `ActionStoreError::kind()`.

use std::fmt;

use thiserror::Error;

use crate::action::{ActionLocator, ActionState};

/// Errors raised while encoding or decoding a persisted action record.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The record ended before a field could be read.
    #[error("unexpected end of record at offset {0}")]
    UnexpectedEof(u64),

    /// CRC32 checksum mismatch; the stored bytes were altered or torn.
    #[error("record CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The CRC32 value stored in the record header.
        expected: u32,
        /// The CRC32 value computed from the record body.
        actual: u32,
    },

    /// The record was written by an unknown format version.
    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u8),

    /// An invalid state byte was encountered.
    #[error("invalid action state byte: {0}")]
    InvalidState(u8),

    /// A string field did not hold valid UTF-8.
    #[error("invalid UTF-8 in record field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The stored attempt timestamp is outside chrono's representable range.
    #[error("invalid attempt timestamp: {secs}s + {nanos}ns")]
    InvalidTimestamp {
        /// Seconds since the Unix epoch.
        secs: i64,
        /// Sub-second nanoseconds.
        nanos: u32,
    },

    /// A variable-length field does not fit a u32 length prefix.
    #[error("record field too large: {size} bytes (max: {max})")]
    FieldTooLarge {
        /// Actual field size in bytes.
        size: usize,
        /// Maximum encodable field size in bytes.
        max: usize,
    },

    /// Bytes remained after the last field was decoded.
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

/// Errors reported by an action store.
#[derive(Debug, Error)]
pub enum ActionStoreError {
    /// The locator does not resolve to a stored action.
    #[error("action not found: {0}")]
    NotFound(ActionLocator),

    /// An error reason was supplied for a state other than `Error`.
    #[error("invalid state transition: error reason {reason:?} is only allowed with state error, got {state}")]
    InvalidStateTransition {
        /// The requested target state.
        state: ActionState,
        /// The rejected error reason.
        reason: String,
    },

    /// The persistence layer failed to read, write or commit.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A stored record could not be decoded.
    #[error("corrupted action record: {0}")]
    Corrupted(#[from] CodecError),

    /// Malformed input to an operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Coarse classification of [`ActionStoreError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ActionStoreError::NotFound`].
    NotFound,
    /// See [`ActionStoreError::InvalidStateTransition`].
    InvalidStateTransition,
    /// Storage and corruption failures.
    StorageFailure,
    /// See [`ActionStoreError::InvalidArgument`].
    InvalidArgument,
}

impl ActionStoreError {
    /// Classify this error into one of the four reported kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionStoreError::NotFound(_) => ErrorKind::NotFound,
            ActionStoreError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            ActionStoreError::Storage(_) | ActionStoreError::Corrupted(_) => {
                ErrorKind::StorageFailure
            }
            ActionStoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Build a `map_err` adapter that wraps a backend error as
    /// [`ActionStoreError::Storage`] with the given context.
    pub(crate) fn storage<E: fmt::Display>(context: &'static str) -> impl FnOnce(E) -> Self {
        move |err| ActionStoreError::Storage(format!("{context}: {err}"))
    }
}

/// Convenience type alias for action store results.
pub type ActionStoreResult<T> = Result<T, ActionStoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::SessionId;

    #[test]
    fn test_not_found_display() {
        let locator = ActionLocator::new(SessionId::new([1, 2, 3, 4]), 7);
        let err = ActionStoreError::NotFound(locator);
        assert_eq!(err.to_string(), "action not found: 01020304/7");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = ActionStoreError::InvalidStateTransition {
            state: ActionState::Done,
            reason: "hello".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("\"hello\""));
        assert!(message.contains("done"));
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }

    #[test]
    fn test_corruption_is_storage_failure() {
        let err = ActionStoreError::from(CodecError::CrcMismatch {
            expected: 0xDEADBEEF,
            actual: 0xCAFEBABE,
        });
        assert!(err.to_string().contains("0xdeadbeef"));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(
            ActionStoreError::Storage("disk gone".into()).kind(),
            ErrorKind::StorageFailure
        );
    }

    #[test]
    fn test_storage_adapter_adds_context() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = ActionStoreError::storage("commit")(io_err);
        assert_eq!(err.to_string(), "storage failure: commit: boom");
    }

    #[test]
    fn test_field_too_large_display() {
        let err = CodecError::FieldTooLarge { size: 4096, max: 2048 };
        assert!(err.to_string().contains("4096"));
        assert!(err.to_string().contains("2048"));
    }
}
