//! Writable ledger handle and the fencing protocol.
//!
//! # Fencing states
//!
//! | store fenced bit | `fence_log_result`       | persisted | state                 |
//! |------------------|--------------------------|-----------|-----------------------|
//! | false            | any                      | false     | Open                  |
//! | true             | pending                  | false     | Fencing               |
//! | true             | any                      | true      | Fenced, persisted     |
//! | true             | absent or failed         | false     | Fenced, unconfirmed   |
//!
//! The decision of what a fence call does is taken under `fence_log_result`'s
//! mutex, including the store's `set_fenced`. The journal append itself is
//! issued after the mutex is released, with the pending outcome already
//! installed so concurrent callers join it instead of appending again.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use ledger_host_storage::{Journal, LacWatcher, LedgerStorage, WriteCallback, WriteCompletion};
use ledger_host_types::{
    EntryId, EntryIdIter, JournalError, LedgerId, MasterKey, codec, config::HandleConfig,
    interrupt,
};
use parking_lot::Mutex;
use snafu::{ResultExt, ensure};
use tracing::{debug, info, instrument, warn};

use crate::{
    descriptor::LedgerDescriptor,
    error::{FenceError, LedgerIdMismatchSnafu, Result, StorageSnafu, UnauthorizedAccessSnafu},
    metrics::{self, FencePath},
    outcome::{FenceOutcome, FencePromise},
};

/// The writable handle of one ledger.
///
/// Obtain it from a [`HandleCache`](crate::HandleCache) so that every caller
/// for the ledger shares the same fencing state.
pub struct LedgerHandle {
    ledger_id: LedgerId,
    master_key: MasterKey,
    storage: Arc<dyn LedgerStorage>,
    fence_ack_before_sync: bool,
    /// Outstanding or most recent fence marker append.
    fence_log_result: Mutex<Option<FenceOutcome>>,
    /// Set once by the first successful journal completion. Never cleared.
    fence_entry_persisted: Arc<AtomicBool>,
}

impl LedgerHandle {
    /// Creates a handle for `ledger_id`, binding `master_key` in the store.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` if the store refuses the key.
    pub fn create(
        ledger_id: LedgerId,
        master_key: MasterKey,
        storage: Arc<dyn LedgerStorage>,
        config: &HandleConfig,
    ) -> Result<Self> {
        storage.set_master_key(ledger_id, &master_key).context(StorageSnafu)?;
        Ok(Self {
            ledger_id,
            master_key,
            storage,
            fence_ack_before_sync: config.fence_ack_before_sync,
            fence_log_result: Mutex::new(None),
            fence_entry_persisted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns true once a fence marker for this handle is durable.
    pub fn is_fence_entry_persisted(&self) -> bool {
        self.fence_entry_persisted.load(Ordering::Acquire)
    }

    /// Submits the fence marker and wires its completion into `promise`.
    fn log_fence_entry(&self, journal: &dyn Journal, promise: FencePromise) {
        let ledger_id = self.ledger_id;
        let promise = Arc::new(promise);
        let persisted = Arc::clone(&self.fence_entry_persisted);
        let on_complete = Arc::clone(&promise);

        let callback: WriteCallback = Box::new(move |completion: WriteCompletion| {
            if completion.rc.is_ok() {
                if persisted.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
                {
                    info!(ledger_id = %ledger_id, "Fence entry persisted");
                    metrics::record_fence_persisted();
                }
                on_complete.complete(Ok(true));
            } else {
                warn!(ledger_id = %ledger_id, rc = %completion.rc, "Failed to log fence entry");
                metrics::record_fence_log_failure("rc");
                on_complete.complete(Ok(false));
            }
        });

        let entry = codec::fence_entry(ledger_id);
        match journal.log_add_entry(entry, self.fence_ack_before_sync, callback) {
            Ok(()) => {},
            Err(JournalError::Interrupted) => {
                interrupt::interrupt_current();
                warn!(ledger_id = %ledger_id, "Interrupted while logging fence entry");
                metrics::record_fence_log_failure("interrupted");
                promise.complete(Err(FenceError::Interrupted));
            },
            Err(source) => {
                warn!(ledger_id = %ledger_id, error = %source, "Journal rejected fence entry");
                metrics::record_fence_log_failure("journal");
                promise.complete(Err(FenceError::Journal { source }));
            },
        }
    }
}

impl LedgerDescriptor for LedgerHandle {
    fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    fn check_access(&self, master_key: &[u8]) -> Result<()> {
        if self.master_key.matches(master_key) {
            return Ok(());
        }
        debug!(ledger_id = %self.ledger_id, "Master key mismatch");
        metrics::record_unauthorized_access();
        UnauthorizedAccessSnafu { ledger_id: self.ledger_id }.fail()
    }

    fn set_fenced(&self) -> Result<bool> {
        self.storage.set_fenced(self.ledger_id).context(StorageSnafu)
    }

    fn is_fenced(&self) -> Result<bool> {
        self.storage.is_fenced(self.ledger_id).context(StorageSnafu)
    }

    #[instrument(skip(self, journal), fields(ledger_id = %self.ledger_id))]
    fn fence_and_log_in_journal(&self, journal: &dyn Journal) -> Result<FenceOutcome> {
        let mut fence_log_result = self.fence_log_result.lock();

        let path = if self.storage.set_fenced(self.ledger_id).context(StorageSnafu)? {
            FencePath::First
        } else if self.fence_entry_persisted.load(Ordering::Acquire) {
            metrics::record_fence_attempt(FencePath::AlreadyPersisted);
            return Ok(FenceOutcome::completed(Ok(true)));
        } else if let Some(outcome) = fence_log_result.as_ref().filter(|o| !o.is_done()) {
            metrics::record_fence_attempt(FencePath::InFlight);
            return Ok(outcome.clone());
        } else {
            debug!("Ledger fenced without a durable fence entry, logging it again");
            FencePath::Retry
        };
        metrics::record_fence_attempt(path);

        let (outcome, promise) = FenceOutcome::pending();
        *fence_log_result = Some(outcome.clone());
        drop(fence_log_result);

        self.log_fence_entry(journal, promise);
        Ok(outcome)
    }

    fn add_entry(&self, entry: Bytes) -> Result<EntryId> {
        let encoded = codec::read_ledger_id(&entry)?;
        ensure!(
            encoded == self.ledger_id,
            LedgerIdMismatchSnafu { encoded: encoded.value(), expected: self.ledger_id.value() }
        );
        self.storage.add_entry(entry).context(StorageSnafu)
    }

    fn read_entry(&self, entry_id: EntryId) -> Result<Bytes> {
        self.storage.get_entry(self.ledger_id, entry_id).context(StorageSnafu)
    }

    fn set_explicit_lac(&self, lac: Bytes) -> Result<()> {
        self.storage.set_explicit_lac(self.ledger_id, lac).context(StorageSnafu)
    }

    fn get_explicit_lac(&self) -> Result<Option<Bytes>> {
        self.storage.get_explicit_lac(self.ledger_id).context(StorageSnafu)
    }

    fn get_last_add_confirmed(&self) -> Result<EntryId> {
        self.storage.get_last_add_confirmed(self.ledger_id).context(StorageSnafu)
    }

    fn wait_for_last_add_confirmed_update(
        &self,
        previous_lac: EntryId,
        watcher: Arc<dyn LacWatcher>,
    ) -> Result<bool> {
        self.storage
            .wait_for_last_add_confirmed_update(self.ledger_id, previous_lac, watcher)
            .context(StorageSnafu)
    }

    fn cancel_wait_for_last_add_confirmed_update(&self, watcher: &Arc<dyn LacWatcher>) -> Result<()> {
        self.storage
            .cancel_wait_for_last_add_confirmed_update(self.ledger_id, watcher)
            .context(StorageSnafu)
    }

    fn get_list_of_entries_of_ledger(&self, ledger_id: LedgerId) -> Result<EntryIdIter> {
        self.storage.get_list_of_entries_of_ledger(ledger_id).context(StorageSnafu)
    }
}

impl std::fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("ledger_id", &self.ledger_id)
            .field("master_key", &self.master_key)
            .field("fence_entry_persisted", &self.is_fence_entry_persisted())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use ledger_host_storage::{InMemoryJournal, InMemoryLedgerStorage};
    use ledger_host_types::{ErrorCode, codec::encode_entry};

    use super::*;
    use crate::error::HandleError;

    const LEDGER: LedgerId = LedgerId::new(123);

    fn handle() -> (LedgerHandle, Arc<InMemoryLedgerStorage>) {
        let storage = Arc::new(InMemoryLedgerStorage::new());
        let handle = LedgerHandle::create(
            LEDGER,
            MasterKey::from([1u8, 2, 3, 4]),
            storage.clone(),
            &HandleConfig::default(),
        )
        .unwrap();
        (handle, storage)
    }

    #[test]
    fn test_create_binds_master_key() {
        let (_handle, storage) = handle();
        assert_eq!(storage.read_master_key(LEDGER).unwrap(), MasterKey::from([1u8, 2, 3, 4]));
    }

    #[test]
    fn test_check_access() {
        let (handle, _) = handle();
        handle.check_access(&[1, 2, 3, 4]).unwrap();
        let err = handle.check_access(&[5, 6, 7, 8]).unwrap_err();
        assert!(matches!(err, HandleError::UnauthorizedAccess { ledger_id } if ledger_id == LEDGER));
        assert!(handle.check_access(&[]).is_err());
        assert!(handle.check_access(&[1, 2, 3]).is_err());
        assert!(handle.check_access(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_add_entry_for_matching_ledger() {
        let (handle, storage) = handle();
        let entry = encode_entry(LEDGER, EntryId::new(0), EntryId::INVALID, b"hello");
        assert_eq!(handle.add_entry(entry.clone()).unwrap(), EntryId::new(0));
        assert_eq!(storage.get_entry(LEDGER, EntryId::new(0)).unwrap(), entry);
        assert_eq!(handle.read_entry(EntryId::new(0)).unwrap(), entry);
    }

    #[test]
    fn test_add_entry_for_other_ledger_is_rejected() {
        let (handle, storage) = handle();
        let entry = encode_entry(LedgerId::new(456), EntryId::new(0), EntryId::INVALID, b"");
        let err = handle.add_entry(entry).unwrap_err();
        assert_eq!(err.to_string(), "Entry for ledger 456 was sent to 123");
        assert_eq!(storage.get_list_of_entries_of_ledger(LEDGER).unwrap().count(), 0);
    }

    #[test]
    fn test_add_entry_too_short() {
        let (handle, _) = handle();
        let err = handle.add_entry(Bytes::from_static(&[0, 0, 0])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntryTooShort);
    }

    #[test]
    fn test_fence_persists_once() {
        let (handle, storage) = handle();
        let journal = InMemoryJournal::new();

        let first = handle.fence_and_log_in_journal(&journal).unwrap();
        assert_eq!(first.wait_blocking(), Ok(true));
        assert!(handle.is_fence_entry_persisted());
        assert!(storage.is_fenced(LEDGER).unwrap());

        let second = handle.fence_and_log_in_journal(&journal).unwrap();
        assert_eq!(second.peek(), Some(Ok(true)));
        assert_eq!(journal.len(), 1, "persisted fence must not be logged again");
        assert_eq!(journal.entries()[0].entry, codec::fence_entry(LEDGER));
    }

    #[test]
    fn test_fence_on_already_fenced_ledger_logs_marker() {
        let (handle, _) = handle();
        let journal = InMemoryJournal::new();
        assert!(handle.set_fenced().unwrap());

        let outcome = handle.fence_and_log_in_journal(&journal).unwrap();
        assert_eq!(outcome.wait_blocking(), Ok(true));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_interrupted_fence_sets_flag_and_retries() {
        let (handle, _) = handle();
        let journal = InMemoryJournal::new();

        interrupt::interrupt_current();
        let outcome = handle.fence_and_log_in_journal(&journal).unwrap();
        assert_eq!(outcome.peek(), Some(Err(FenceError::Interrupted)));
        assert!(interrupt::take_interrupted(), "interrupt flag must be restored");
        assert!(!handle.is_fence_entry_persisted());

        let retry = handle.fence_and_log_in_journal(&journal).unwrap();
        assert!(!retry.same_outcome(&outcome));
        assert_eq!(retry.wait_blocking(), Ok(true));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_fence_after_journal_shutdown() {
        let (handle, _) = handle();
        let journal = InMemoryJournal::new();
        journal.shutdown();
        let outcome = handle.fence_and_log_in_journal(&journal).unwrap();
        assert_eq!(outcome.peek(), Some(Err(FenceError::Journal { source: JournalError::ShutDown })));
    }

    #[test]
    fn test_lac_passthroughs() {
        let (handle, _) = handle();
        assert_eq!(handle.get_last_add_confirmed().unwrap(), EntryId::INVALID);
        handle.add_entry(encode_entry(LEDGER, EntryId::new(0), EntryId::INVALID, b"")).unwrap();
        handle.add_entry(encode_entry(LEDGER, EntryId::new(1), EntryId::new(0), b"")).unwrap();
        assert_eq!(handle.get_last_add_confirmed().unwrap(), EntryId::new(0));

        assert_eq!(handle.get_explicit_lac().unwrap(), None);
        handle.set_explicit_lac(Bytes::from_static(b"explicit")).unwrap();
        assert_eq!(handle.get_explicit_lac().unwrap(), Some(Bytes::from_static(b"explicit")));
    }

    #[test]
    fn test_debug_redacts_key() {
        let (handle, _) = handle();
        let debug = format!("{handle:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("[1, 2, 3, 4]"));
    }
}
