//! Write-ahead log capability trait and an in-memory journal.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use ledger_host_types::{
    EntryId, JournalError, LedgerId, ReturnCode, codec::EntryHeader, interrupt,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Status delivered to a [`WriteCallback`] once the journal has finished with
/// an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCompletion {
    /// [`ReturnCode::OK`] once the entry is durable.
    pub rc: ReturnCode,
    /// Ledger id from the entry header.
    pub ledger_id: LedgerId,
    /// Entry id from the entry header.
    pub entry_id: EntryId,
}

/// One-shot completion callback for a journal append.
///
/// The journal invokes it at most once, from any thread. Dropping it without
/// invoking it means the append's outcome will never be reported.
pub type WriteCallback = Box<dyn FnOnce(WriteCompletion) + Send>;

/// Durable, append-only write-ahead log.
pub trait Journal: Send + Sync {
    /// Submits `entry` for asynchronous durable append.
    ///
    /// With `ack_before_sync`, the journal may report success before the
    /// entry reaches stable storage.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Interrupted`] if the calling thread was
    /// interrupted while submitting, or [`JournalError::ShutDown`] once the
    /// journal stops accepting entries. The callback is not invoked in either
    /// case.
    fn log_add_entry(
        &self,
        entry: Bytes,
        ack_before_sync: bool,
        callback: WriteCallback,
    ) -> Result<(), JournalError>;
}

/// An entry accepted by [`InMemoryJournal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournaledEntry {
    /// Raw entry bytes.
    pub entry: Bytes,
    /// Flag supplied with the append.
    pub ack_before_sync: bool,
}

/// In-memory journal that acknowledges every well-formed append synchronously.
///
/// Submission honours the calling thread's interrupt flag, consuming it and
/// failing with [`JournalError::Interrupted`]. Entries without a 16-byte
/// header complete with [`ReturnCode::WRITE_EXCEPTION`].
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    entries: Mutex<Vec<JournaledEntry>>,
    shut_down: AtomicBool,
}

impl InMemoryJournal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the accepted entries in append order.
    pub fn entries(&self) -> Vec<JournaledEntry> {
        self.entries.lock().clone()
    }

    /// Number of accepted entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Stops accepting entries.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    /// Returns true after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Journal for InMemoryJournal {
    fn log_add_entry(
        &self,
        entry: Bytes,
        ack_before_sync: bool,
        callback: WriteCallback,
    ) -> Result<(), JournalError> {
        if self.is_shut_down() {
            return Err(JournalError::ShutDown);
        }
        if interrupt::take_interrupted() {
            debug!("Journal submission interrupted");
            return Err(JournalError::Interrupted);
        }

        let completion = match EntryHeader::decode(&entry) {
            Ok(EntryHeader { ledger_id, entry_id }) => {
                self.entries.lock().push(JournaledEntry { entry, ack_before_sync });
                WriteCompletion { rc: ReturnCode::OK, ledger_id, entry_id }
            },
            Err(e) => {
                warn!(error = %e, "Rejecting journal entry without header");
                WriteCompletion {
                    rc: ReturnCode::WRITE_EXCEPTION,
                    ledger_id: LedgerId::new(-1),
                    entry_id: EntryId::INVALID,
                }
            },
        };
        callback(completion);
        Ok(())
    }
}
