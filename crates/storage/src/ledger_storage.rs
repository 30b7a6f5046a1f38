//! Record store capability trait.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use ledger_host_types::{EntryId, EntryIdIter, LedgerId, MasterKey, StorageResult};

use crate::watcher::LacWatcher;

/// Notified when a ledger is deleted from the store.
pub trait LedgerDeletionListener: Send + Sync {
    /// Called once per deleted ledger, after the store has dropped its state.
    /// `was_fenced` is the fenced bit the ledger had when it was removed.
    fn ledger_deleted(&self, ledger_id: LedgerId, was_fenced: bool);
}

/// Durable per-ledger record store.
///
/// The store owns every piece of ledger state that must outlive a handle:
/// entries, the fenced bit, the LAC and its watchers, the explicit LAC, and
/// the master key. Implementations must be safe to call from any thread.
pub trait LedgerStorage: Send + Sync {
    /// Binds `master_key` to `ledger_id`, creating the ledger if it is new.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::OperationRejected` if the ledger exists with a
    /// different key.
    fn set_master_key(&self, ledger_id: LedgerId, master_key: &MasterKey) -> StorageResult<()>;

    /// Reads the master key stored for `ledger_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn read_master_key(&self, ledger_id: LedgerId) -> StorageResult<MasterKey>;

    /// Returns true when the store holds `ledger_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the lookup fails.
    fn ledger_exists(&self, ledger_id: LedgerId) -> StorageResult<bool>;

    /// Persists `entry` and returns the entry id it was stored under.
    ///
    /// The entry carries its own (ledger id, entry id) header.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MalformedEntry`, `NoLedger`, `DuplicateEntry`,
    /// `LedgerFenced` or `Io` depending on the store.
    fn add_entry(&self, entry: Bytes) -> StorageResult<EntryId>;

    /// Reads an entry. [`EntryId::LAST_ADD_CONFIRMED`] resolves to the entry at
    /// the ledger's current LAC.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` or `NoEntry` when absent.
    fn get_entry(&self, ledger_id: LedgerId, entry_id: EntryId) -> StorageResult<Bytes>;

    /// Sets the fenced bit. Returns true only for the call that flipped it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn set_fenced(&self, ledger_id: LedgerId) -> StorageResult<bool>;

    /// Reads the fenced bit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn is_fenced(&self, ledger_id: LedgerId) -> StorageResult<bool>;

    /// Stores an explicit LAC payload.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn set_explicit_lac(&self, ledger_id: LedgerId, lac: Bytes) -> StorageResult<()>;

    /// Reads the explicit LAC payload, if one was stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn get_explicit_lac(&self, ledger_id: LedgerId) -> StorageResult<Option<Bytes>>;

    /// Reads the ledger's last-add-confirmed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn get_last_add_confirmed(&self, ledger_id: LedgerId) -> StorageResult<EntryId>;

    /// Registers `watcher` for the next LAC advance past `previous_lac`.
    ///
    /// Returns false without registering when the LAC already exceeds
    /// `previous_lac`; the caller should read it immediately.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn wait_for_last_add_confirmed_update(
        &self,
        ledger_id: LedgerId,
        previous_lac: EntryId,
        watcher: Arc<dyn LacWatcher>,
    ) -> StorageResult<bool>;

    /// Withdraws a registration made by
    /// [`wait_for_last_add_confirmed_update`](Self::wait_for_last_add_confirmed_update).
    /// Cancelling an unknown watcher is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the store cannot be reached.
    fn cancel_wait_for_last_add_confirmed_update(
        &self,
        ledger_id: LedgerId,
        watcher: &Arc<dyn LacWatcher>,
    ) -> StorageResult<()>;

    /// Lists the ids of the entries held for `ledger_id` in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn get_list_of_entries_of_ledger(&self, ledger_id: LedgerId) -> StorageResult<EntryIdIter>;

    /// Removes the ledger, then notifies registered deletion listeners.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NoLedger` if the ledger does not exist.
    fn delete_ledger(&self, ledger_id: LedgerId) -> StorageResult<()>;

    /// Subscribes `listener` to ledger deletions. Listeners that have been
    /// dropped are skipped.
    fn register_ledger_deletion_listener(&self, listener: Weak<dyn LedgerDeletionListener>);
}
