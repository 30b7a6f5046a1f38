//! Error types for ledger handles.

use ledger_host_types::{ErrorCode, JournalError, LedgerId, StorageError, codec::CodecError};
use snafu::Snafu;

/// Errors returned synchronously by ledger handle and handle cache operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HandleError {
    /// The supplied master key does not match the ledger's key.
    #[snafu(display("Master key mismatch for {ledger_id}"))]
    UnauthorizedAccess {
        /// Ledger identifier.
        ledger_id: LedgerId,
    },

    /// The entry's embedded ledger id does not match the handle.
    #[snafu(display("Entry for ledger {encoded} was sent to {expected}"))]
    LedgerIdMismatch {
        /// Ledger id decoded from the entry.
        encoded: i64,
        /// Ledger id of the handle.
        expected: i64,
    },

    /// The entry buffer cannot hold a ledger id.
    #[snafu(display("Entry of {len} bytes is too short to carry a ledger id, need {required}"))]
    EntryTooShort {
        /// Actual buffer length.
        len: usize,
        /// Bytes required.
        required: usize,
    },

    /// A mutating operation was invoked on a read-only handle.
    #[snafu(display("Invalid action on read only descriptor: {operation} on {ledger_id}"))]
    ReadOnlyHandle {
        /// Ledger identifier.
        ledger_id: LedgerId,
        /// Rejected operation.
        operation: &'static str,
    },

    /// The ledger was fenced and then deleted; it may only be reopened during
    /// journal replay.
    #[snafu(display("{ledger_id} was fenced and deleted"))]
    LedgerFencedAndDeleted {
        /// Ledger identifier.
        ledger_id: LedgerId,
    },

    /// The record store failed.
    #[snafu(display("Storage error: {source}"))]
    Storage {
        /// Underlying store error.
        source: StorageError,
    },
}

impl HandleError {
    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnauthorizedAccess { .. } => ErrorCode::UnauthorizedAccess,
            Self::LedgerIdMismatch { .. } => ErrorCode::LedgerIdMismatch,
            Self::EntryTooShort { .. } => ErrorCode::EntryTooShort,
            Self::ReadOnlyHandle { .. } => ErrorCode::ReadOnlyHandle,
            Self::LedgerFencedAndDeleted { .. } => ErrorCode::LedgerFencedAndDeleted,
            Self::Storage { source } => source.code(),
        }
    }

    /// Whether this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<StorageError> for HandleError {
    fn from(source: StorageError) -> Self {
        HandleError::Storage { source }
    }
}

impl From<CodecError> for HandleError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::TooShort { len, required } => HandleError::EntryTooShort { len, required },
        }
    }
}

/// Result type alias for handle operations.
pub type Result<T, E = HandleError> = std::result::Result<T, E>;

/// Ways a fence marker append can fail to report a durable/non-durable result.
///
/// A non-OK journal return code is not an error: it completes the outcome
/// with `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum FenceError {
    /// The fencing thread was interrupted while submitting to the journal.
    /// Its interrupt flag has been set again.
    #[snafu(display("Interrupted while logging fence entry"))]
    Interrupted,

    /// The journal refused the fence entry.
    #[snafu(display("Journal rejected fence entry: {source}"))]
    Journal {
        /// Journal submission error.
        source: JournalError,
    },

    /// The journal dropped the completion callback without invoking it.
    #[snafu(display("Fence entry append was abandoned by the journal"))]
    Abandoned,
}

impl FenceError {
    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Interrupted => ErrorCode::JournalInterrupted,
            Self::Journal { source } => source.code(),
            Self::Abandoned => ErrorCode::FenceAbandoned,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_id_mismatch_message_uses_raw_ids() {
        let err = HandleError::LedgerIdMismatch { encoded: 456, expected: 123 };
        assert_eq!(err.to_string(), "Entry for ledger 456 was sent to 123");
        assert_eq!(err.code(), ErrorCode::LedgerIdMismatch);
    }

    #[test]
    fn test_read_only_message() {
        let err = HandleError::ReadOnlyHandle { ledger_id: LedgerId::new(3), operation: "add_entry" };
        assert!(err.to_string().starts_with("Invalid action on read only descriptor"));
    }

    #[test]
    fn test_storage_errors_keep_their_code() {
        let err: HandleError = StorageError::NoLedger { ledger_id: LedgerId::new(1) }.into();
        assert_eq!(err.code(), ErrorCode::StorageNoLedger);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_codec_error_maps_to_entry_too_short() {
        let err: HandleError = CodecError::TooShort { len: 3, required: 8 }.into();
        assert!(matches!(err, HandleError::EntryTooShort { len: 3, required: 8 }));
    }

    #[test]
    fn test_fence_error_codes() {
        assert_eq!(FenceError::Interrupted.code(), ErrorCode::JournalInterrupted);
        assert_eq!(
            FenceError::Journal { source: JournalError::ShutDown }.code(),
            ErrorCode::JournalShutDown
        );
        assert!(FenceError::Abandoned.code().is_retryable());
    }
}
