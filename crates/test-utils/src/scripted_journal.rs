//! A journal whose completions are driven by the test.

use std::{collections::VecDeque, fmt};

use bytes::Bytes;
use ledger_host_storage::{Journal, JournaledEntry, WriteCallback, WriteCompletion};
use ledger_host_types::{
    EntryId, JournalError, LedgerId, ReturnCode, codec::EntryHeader, interrupt,
};
use parking_lot::Mutex;

/// How [`ScriptedJournal`] completes accepted appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// Invoke the callback synchronously with this return code.
    Immediate(ReturnCode),
    /// Queue the callback until the test completes or drops it.
    Hold,
}

struct Pending {
    completion: WriteCompletion,
    callback: WriteCallback,
}

/// Journal for exercising completion ordering and failure paths.
///
/// Appends are recorded in submission order. Depending on the [`AckMode`]
/// their callbacks run immediately or wait in a FIFO for
/// [`complete_next`](Self::complete_next) or [`drop_next`](Self::drop_next).
/// Submission honours the calling thread's interrupt flag like a real
/// journal blocked on a full queue would.
pub struct ScriptedJournal {
    mode: Mutex<AckMode>,
    submissions: Mutex<Vec<JournaledEntry>>,
    pending: Mutex<VecDeque<Pending>>,
    submit_failures: Mutex<VecDeque<JournalError>>,
}

impl ScriptedJournal {
    /// Journal that acknowledges every append synchronously with `OK`.
    pub fn auto_ack() -> Self {
        Self::with_mode(AckMode::Immediate(ReturnCode::OK))
    }

    /// Journal that holds every callback until the test releases it.
    pub fn holding() -> Self {
        Self::with_mode(AckMode::Hold)
    }

    /// Journal with an explicit [`AckMode`].
    pub fn with_mode(mode: AckMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            submissions: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            submit_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Changes how later appends complete. Already held callbacks stay held.
    pub fn set_mode(&self, mode: AckMode) {
        *self.mode.lock() = mode;
    }

    /// Makes the next submission fail synchronously with `error`.
    pub fn fail_next_submit(&self, error: JournalError) {
        self.submit_failures.lock().push_back(error);
    }

    /// Every accepted append, in submission order.
    pub fn submissions(&self) -> Vec<JournaledEntry> {
        self.submissions.lock().clone()
    }

    /// Number of accepted appends.
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    /// Number of held callbacks.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Invokes the oldest held callback with `rc`. Returns false if none is held.
    pub fn complete_next(&self, rc: ReturnCode) -> bool {
        let Some(Pending { completion, callback }) = self.pending.lock().pop_front() else {
            return false;
        };
        callback(WriteCompletion { rc, ..completion });
        true
    }

    /// Completes every held callback with `rc` and returns how many ran.
    pub fn complete_all(&self, rc: ReturnCode) -> usize {
        let mut completed = 0;
        while self.complete_next(rc) {
            completed += 1;
        }
        completed
    }

    /// Drops the oldest held callback without invoking it.
    pub fn drop_next(&self) -> bool {
        self.pending.lock().pop_front().is_some()
    }
}

impl Default for ScriptedJournal {
    fn default() -> Self {
        Self::auto_ack()
    }
}

impl fmt::Debug for ScriptedJournal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedJournal")
            .field("mode", &*self.mode.lock())
            .field("submissions", &self.submission_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Journal for ScriptedJournal {
    fn log_add_entry(
        &self,
        entry: Bytes,
        ack_before_sync: bool,
        callback: WriteCallback,
    ) -> Result<(), JournalError> {
        if interrupt::take_interrupted() {
            return Err(JournalError::Interrupted);
        }
        if let Some(error) = self.submit_failures.lock().pop_front() {
            return Err(error);
        }

        let (ledger_id, entry_id) = match EntryHeader::decode(&entry) {
            Ok(header) => (header.ledger_id, header.entry_id),
            Err(_) => (LedgerId::new(-1), EntryId::INVALID),
        };
        self.submissions.lock().push(JournaledEntry { entry, ack_before_sync });

        let completion = WriteCompletion { rc: ReturnCode::OK, ledger_id, entry_id };
        let mode = *self.mode.lock();
        match mode {
            AckMode::Immediate(rc) => callback(WriteCompletion { rc, ..completion }),
            AckMode::Hold => self.pending.lock().push_back(Pending { completion, callback }),
        }
        Ok(())
    }
}
