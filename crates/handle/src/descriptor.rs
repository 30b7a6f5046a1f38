use std::sync::Arc;

use bytes::Bytes;
use ledger_host_storage::{Journal, LacWatcher};
use ledger_host_types::{EntryId, EntryIdIter, LedgerId};

use crate::{error::Result, outcome::FenceOutcome};

/// Operations available on a cached ledger handle.
///
/// Implemented by [`LedgerHandle`](crate::LedgerHandle), which permits all of
/// them, and by [`ReadOnlyLedgerHandle`](crate::ReadOnlyLedgerHandle), which
/// rejects every mutating call with `HandleError::ReadOnlyHandle`.
pub trait LedgerDescriptor: Send + Sync {
    /// Ledger this handle serves.
    fn ledger_id(&self) -> LedgerId;

    /// Checks `master_key` against the ledger's key, byte for byte.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::UnauthorizedAccess` on mismatch.
    fn check_access(&self, master_key: &[u8]) -> Result<()>;

    /// Sets the store's fenced bit. Returns true if this call flipped it.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn set_fenced(&self) -> Result<bool>;

    /// Reads the store's fenced bit.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn is_fenced(&self) -> Result<bool>;

    /// Fences the ledger and durably records the fence in `journal`.
    ///
    /// Never waits for the journal. Concurrent callers share one outstanding
    /// append; once the marker is durable, later calls resolve immediately.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` if the fenced bit cannot be set.
    /// Journal failures are reported through the returned outcome.
    fn fence_and_log_in_journal(&self, journal: &dyn Journal) -> Result<FenceOutcome>;

    /// Validates the entry's embedded ledger id and stores it.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::EntryTooShort` or `LedgerIdMismatch` without
    /// touching the store, or `HandleError::Storage` on store failure.
    fn add_entry(&self, entry: Bytes) -> Result<EntryId>;

    /// Reads an entry from the store.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn read_entry(&self, entry_id: EntryId) -> Result<Bytes>;

    /// Stores an explicit LAC payload.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn set_explicit_lac(&self, lac: Bytes) -> Result<()>;

    /// Reads the explicit LAC payload.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn get_explicit_lac(&self) -> Result<Option<Bytes>>;

    /// Reads the ledger's last-add-confirmed.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn get_last_add_confirmed(&self) -> Result<EntryId>;

    /// Registers `watcher` for the next LAC advance past `previous_lac`.
    /// Returns false when the LAC has already moved on.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn wait_for_last_add_confirmed_update(
        &self,
        previous_lac: EntryId,
        watcher: Arc<dyn LacWatcher>,
    ) -> Result<bool>;

    /// Withdraws a LAC watch registration. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn cancel_wait_for_last_add_confirmed_update(&self, watcher: &Arc<dyn LacWatcher>) -> Result<()>;

    /// Lists the entry ids the store holds for `ledger_id`.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` on store failure.
    fn get_list_of_entries_of_ledger(&self, ledger_id: LedgerId) -> Result<EntryIdIter>;
}
