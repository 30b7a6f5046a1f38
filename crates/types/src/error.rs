//! Error types for ledger-host using snafu.
//!
//! Defines the errors raised by the external collaborators of a ledger
//! handle:
//! - Record store errors ([`StorageError`])
//! - Journal submission errors ([`JournalError`])
//! - Journal completion status codes ([`ReturnCode`])
//!
//! Every error variant across the workspace maps to an [`ErrorCode`] with a
//! unique numeric identifier and a retryability classification.

use std::fmt;

use snafu::Snafu;

use crate::types::{EntryId, LedgerId};

/// Machine-readable error codes for programmatic error handling.
///
/// Codes are organized into ranges:
///
/// | Range       | Domain   | Examples                                     |
/// |-------------|----------|----------------------------------------------|
/// | 1000–1099   | Access   | Master key mismatch, read-only handle        |
/// | 1100–1199   | Entry    | Ledger id mismatch, truncated entry          |
/// | 1200–1299   | Ledger   | Fenced-and-deleted ledger, abandoned fence   |
/// | 2000–2099   | Storage  | Missing ledger/entry, duplicates, I/O        |
/// | 3000–3099   | Journal  | Interrupted submission, journal shut down    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // --- Access errors (1000–1099) ---
    /// Supplied master key does not match the ledger's key.
    UnauthorizedAccess = 1000,
    /// Mutating operation attempted on a read-only handle.
    ReadOnlyHandle = 1001,

    // --- Entry errors (1100–1199) ---
    /// Entry's embedded ledger id does not match the handle.
    LedgerIdMismatch = 1100,
    /// Entry buffer too short to carry a ledger id.
    EntryTooShort = 1101,

    // --- Ledger lifecycle errors (1200–1299) ---
    /// Ledger was fenced and then deleted.
    LedgerFencedAndDeleted = 1200,
    /// Fence marker append was dropped by the journal without completing.
    FenceAbandoned = 1201,

    // --- Storage errors (2000–2099) ---
    /// Ledger unknown to the record store.
    StorageNoLedger = 2000,
    /// Entry unknown to the record store.
    StorageNoEntry = 2001,
    /// Entry id already written.
    StorageDuplicateEntry = 2002,
    /// Store refused a write because the ledger is fenced.
    StorageLedgerFenced = 2003,
    /// Store rejected the operation.
    StorageOperationRejected = 2004,
    /// Entry lacks the header the store requires.
    StorageMalformedEntry = 2005,
    /// Disk or device failure.
    StorageIo = 2006,

    // --- Journal errors (3000–3099) ---
    /// Journal submission interrupted.
    JournalInterrupted = 3000,
    /// Journal no longer accepts entries.
    JournalShutDown = 3001,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::UnauthorizedAccess),
            1001 => Some(Self::ReadOnlyHandle),
            1100 => Some(Self::LedgerIdMismatch),
            1101 => Some(Self::EntryTooShort),
            1200 => Some(Self::LedgerFencedAndDeleted),
            1201 => Some(Self::FenceAbandoned),
            2000 => Some(Self::StorageNoLedger),
            2001 => Some(Self::StorageNoEntry),
            2002 => Some(Self::StorageDuplicateEntry),
            2003 => Some(Self::StorageLedgerFenced),
            2004 => Some(Self::StorageOperationRejected),
            2005 => Some(Self::StorageMalformedEntry),
            2006 => Some(Self::StorageIo),
            3000 => Some(Self::JournalInterrupted),
            3001 => Some(Self::JournalShutDown),
            _ => None,
        }
    }

    /// Whether this error is retryable.
    ///
    /// Retryable errors may succeed on a subsequent attempt without any
    /// corrective action by the caller.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::FenceAbandoned
                | Self::StorageOperationRejected
                | Self::StorageIo
                | Self::JournalInterrupted
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Record store errors.
///
/// Ledger handles propagate these verbatim; they never translate or retry
/// them.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// The ledger does not exist in the store.
    #[snafu(display("Ledger {ledger_id} not found"))]
    NoLedger {
        /// Ledger identifier.
        ledger_id: LedgerId,
    },

    /// The entry does not exist in the store.
    #[snafu(display("Entry {entry_id} not found in ledger {ledger_id}"))]
    NoEntry {
        /// Ledger identifier.
        ledger_id: LedgerId,
        /// Entry identifier.
        entry_id: EntryId,
    },

    /// The entry id was already written.
    #[snafu(display("Duplicate entry {entry_id} in ledger {ledger_id}"))]
    DuplicateEntry {
        /// Ledger identifier.
        ledger_id: LedgerId,
        /// Entry identifier.
        entry_id: EntryId,
    },

    /// The store refuses writes to fenced ledgers.
    #[snafu(display("Ledger {ledger_id} is fenced"))]
    LedgerFenced {
        /// Ledger identifier.
        ledger_id: LedgerId,
    },

    /// The store rejected the operation.
    #[snafu(display("Operation rejected: {reason}"))]
    OperationRejected {
        /// Why the operation was rejected.
        reason: String,
    },

    /// The entry lacks the header the store requires.
    #[snafu(display("Malformed entry: {source}"))]
    MalformedEntry {
        /// Decoding failure.
        source: crate::codec::CodecError,
    },

    /// Disk or device failure.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl StorageError {
    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoLedger { .. } => ErrorCode::StorageNoLedger,
            Self::NoEntry { .. } => ErrorCode::StorageNoEntry,
            Self::DuplicateEntry { .. } => ErrorCode::StorageDuplicateEntry,
            Self::LedgerFenced { .. } => ErrorCode::StorageLedgerFenced,
            Self::OperationRejected { .. } => ErrorCode::StorageOperationRejected,
            Self::MalformedEntry { .. } => ErrorCode::StorageMalformedEntry,
            Self::Io { .. } => ErrorCode::StorageIo,
        }
    }

    /// Whether this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<std::io::Error> for StorageError {
    fn from(source: std::io::Error) -> Self {
        StorageError::Io { source }
    }
}

/// Result type alias for record store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Synchronous failure to submit an entry to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum JournalError {
    /// The submitting thread was interrupted while waiting on the journal.
    #[snafu(display("Journal submission interrupted"))]
    Interrupted,

    /// The journal no longer accepts entries.
    #[snafu(display("Journal is shut down"))]
    ShutDown,
}

impl JournalError {
    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Interrupted => ErrorCode::JournalInterrupted,
            Self::ShutDown => ErrorCode::JournalShutDown,
        }
    }
}

/// Status code delivered to a journal write callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(i32);

impl ReturnCode {
    /// The entry is durable.
    pub const OK: Self = Self(0);
    /// The journal could not reach its backing device.
    pub const BOOKIE_HANDLE_NOT_AVAILABLE: Self = Self(-8);
    /// The journal failed to write the entry.
    pub const WRITE_EXCEPTION: Self = Self(-12);

    /// Creates a return code from its raw value.
    pub const fn new(rc: i32) -> Self {
        Self(rc)
    }

    /// Returns the raw value.
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Returns true for [`ReturnCode::OK`].
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OK => write!(f, "OK"),
            Self::BOOKIE_HANDLE_NOT_AVAILABLE => write!(f, "BookieHandleNotAvailable({})", self.0),
            Self::WRITE_EXCEPTION => write!(f, "WriteException({})", self.0),
            _ => write!(f, "rc({})", self.0),
        }
    }
}
