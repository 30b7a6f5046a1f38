use std::sync::Arc;

use bytes::Bytes;
use ledger_host_storage::{Journal, LacWatcher, LedgerStorage};
use ledger_host_types::{EntryId, EntryIdIter, LedgerId, StorageError};
use snafu::ResultExt;

use crate::{
    descriptor::LedgerDescriptor,
    error::{ReadOnlyHandleSnafu, Result, StorageSnafu},
    outcome::FenceOutcome,
};

/// Read access to an existing ledger.
///
/// Every mutating call, including the access check, fails with
/// `HandleError::ReadOnlyHandle`.
pub struct ReadOnlyLedgerHandle {
    ledger_id: LedgerId,
    storage: Arc<dyn LedgerStorage>,
}

impl ReadOnlyLedgerHandle {
    /// Opens `ledger_id` for reading.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` with `StorageError::NoLedger` if the
    /// ledger does not exist.
    pub fn open(ledger_id: LedgerId, storage: Arc<dyn LedgerStorage>) -> Result<Self> {
        if !storage.ledger_exists(ledger_id).context(StorageSnafu)? {
            return Err(StorageError::NoLedger { ledger_id }.into());
        }
        Ok(Self { ledger_id, storage })
    }

    fn reject<T>(&self, operation: &'static str) -> Result<T> {
        ReadOnlyHandleSnafu { ledger_id: self.ledger_id, operation }.fail()
    }
}

impl LedgerDescriptor for ReadOnlyLedgerHandle {
    fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    fn check_access(&self, _master_key: &[u8]) -> Result<()> {
        self.reject("check_access")
    }

    fn set_fenced(&self) -> Result<bool> {
        self.reject("set_fenced")
    }

    fn is_fenced(&self) -> Result<bool> {
        self.storage.is_fenced(self.ledger_id).context(StorageSnafu)
    }

    fn fence_and_log_in_journal(&self, _journal: &dyn Journal) -> Result<FenceOutcome> {
        self.reject("fence_and_log_in_journal")
    }

    fn add_entry(&self, _entry: Bytes) -> Result<EntryId> {
        self.reject("add_entry")
    }

    fn read_entry(&self, entry_id: EntryId) -> Result<Bytes> {
        self.storage.get_entry(self.ledger_id, entry_id).context(StorageSnafu)
    }

    fn set_explicit_lac(&self, _lac: Bytes) -> Result<()> {
        self.reject("set_explicit_lac")
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

impl std::fmt::Debug for ReadOnlyLedgerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyLedgerHandle")
            .field("ledger_id", &self.ledger_id)
            .finish_non_exhaustive()
    }
}
