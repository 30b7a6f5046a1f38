//! Fault injection for the record store.
//!
//! [`FaultyStorage`] wraps an [`InMemoryLedgerStorage`] and fails selected
//! operations on demand. Each [`StorageOp`] can be armed to fail a fixed
//! number of times or until cleared, with the error produced by a factory so
//! non-`Clone` variants such as `StorageError::Io` can be injected repeatedly.
//!
//! Calls are counted per operation whether or not they fail, which lets tests
//! assert that a code path never reached the store.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use bytes::Bytes;
use ledger_host_storage::{
    InMemoryLedgerStorage, LacWatcher, LedgerDeletionListener, LedgerStorage,
};
use ledger_host_types::{EntryId, EntryIdIter, LedgerId, MasterKey, StorageError, StorageResult};
use parking_lot::Mutex;

/// Record store operations that can be failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    /// [`LedgerStorage::set_master_key`].
    SetMasterKey,
    /// [`LedgerStorage::read_master_key`].
    ReadMasterKey,
    /// [`LedgerStorage::ledger_exists`].
    LedgerExists,
    /// [`LedgerStorage::add_entry`].
    AddEntry,
    /// [`LedgerStorage::get_entry`].
    GetEntry,
    /// [`LedgerStorage::set_fenced`].
    SetFenced,
    /// [`LedgerStorage::is_fenced`].
    IsFenced,
    /// [`LedgerStorage::set_explicit_lac`].
    SetExplicitLac,
    /// [`LedgerStorage::get_explicit_lac`].
    GetExplicitLac,
    /// [`LedgerStorage::get_last_add_confirmed`].
    GetLastAddConfirmed,
    /// [`LedgerStorage::wait_for_last_add_confirmed_update`].
    WaitForLacUpdate,
    /// [`LedgerStorage::cancel_wait_for_last_add_confirmed_update`].
    CancelWaitForLacUpdate,
    /// [`LedgerStorage::get_list_of_entries_of_ledger`].
    ListEntries,
    /// [`LedgerStorage::delete_ledger`].
    DeleteLedger,
}

type ErrorFactory = Arc<dyn Fn() -> StorageError + Send + Sync>;

struct Fault {
    /// `None` fails every call until cleared.
    remaining: Option<usize>,
    make_error: ErrorFactory,
}

/// Record store that fails armed operations and delegates the rest.
pub struct FaultyStorage {
    inner: InMemoryLedgerStorage,
    faults: Mutex<HashMap<StorageOp, Fault>>,
    calls: Mutex<HashMap<StorageOp, usize>>,
}

impl FaultyStorage {
    /// Creates an empty store with no faults armed.
    pub fn new() -> Self {
        Self {
            inner: InMemoryLedgerStorage::new(),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Fails the next `times` calls to `op`.
    pub fn fail_next<F>(&self, op: StorageOp, times: usize, make_error: F)
    where
        F: Fn() -> StorageError + Send + Sync + 'static,
    {
        self.faults.lock().insert(op, Fault { remaining: Some(times), make_error: Arc::new(make_error) });
    }

    /// Fails every call to `op` until [`clear_faults`](Self::clear_faults).
    pub fn fail_always<F>(&self, op: StorageOp, make_error: F)
    where
        F: Fn() -> StorageError + Send + Sync + 'static,
    {
        self.faults.lock().insert(op, Fault { remaining: None, make_error: Arc::new(make_error) });
    }

    /// Disarms every fault.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Number of calls made to `op`, failed or not.
    pub fn calls(&self, op: StorageOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// The wrapped store, for setup and inspection that bypasses injection.
    pub fn inner(&self) -> &InMemoryLedgerStorage {
        &self.inner
    }

    fn enter(&self, op: StorageOp) -> StorageResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        let mut faults = self.faults.lock();
        let Some(fault) = faults.get_mut(&op) else {
            return Ok(());
        };
        let error = (fault.make_error)();
        match &mut fault.remaining {
            None => {},
            Some(0) => {
                faults.remove(&op);
                return Ok(());
            },
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    faults.remove(&op);
                }
            },
        }
        Err(error)
    }
}

impl Default for FaultyStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FaultyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let armed: Vec<StorageOp> = self.faults.lock().keys().copied().collect();
        f.debug_struct("FaultyStorage").field("armed", &armed).finish_non_exhaustive()
    }
}

impl LedgerStorage for FaultyStorage {
    fn set_master_key(&self, ledger_id: LedgerId, master_key: &MasterKey) -> StorageResult<()> {
        self.enter(StorageOp::SetMasterKey)?;
        self.inner.set_master_key(ledger_id, master_key)
    }

    fn read_master_key(&self, ledger_id: LedgerId) -> StorageResult<MasterKey> {
        self.enter(StorageOp::ReadMasterKey)?;
        self.inner.read_master_key(ledger_id)
    }

    fn ledger_exists(&self, ledger_id: LedgerId) -> StorageResult<bool> {
        self.enter(StorageOp::LedgerExists)?;
        self.inner.ledger_exists(ledger_id)
    }

    fn add_entry(&self, entry: Bytes) -> StorageResult<EntryId> {
        self.enter(StorageOp::AddEntry)?;
        self.inner.add_entry(entry)
    }

    fn get_entry(&self, ledger_id: LedgerId, entry_id: EntryId) -> StorageResult<Bytes> {
        self.enter(StorageOp::GetEntry)?;
        self.inner.get_entry(ledger_id, entry_id)
    }

    fn set_fenced(&self, ledger_id: LedgerId) -> StorageResult<bool> {
        self.enter(StorageOp::SetFenced)?;
        self.inner.set_fenced(ledger_id)
    }

    fn is_fenced(&self, ledger_id: LedgerId) -> StorageResult<bool> {
        self.enter(StorageOp::IsFenced)?;
        self.inner.is_fenced(ledger_id)
    }

    fn set_explicit_lac(&self, ledger_id: LedgerId, lac: Bytes) -> StorageResult<()> {
        self.enter(StorageOp::SetExplicitLac)?;
        self.inner.set_explicit_lac(ledger_id, lac)
    }

    fn get_explicit_lac(&self, ledger_id: LedgerId) -> StorageResult<Option<Bytes>> {
        self.enter(StorageOp::GetExplicitLac)?;
        self.inner.get_explicit_lac(ledger_id)
    }

    fn get_last_add_confirmed(&self, ledger_id: LedgerId) -> StorageResult<EntryId> {
        self.enter(StorageOp::GetLastAddConfirmed)?;
        self.inner.get_last_add_confirmed(ledger_id)
    }

    fn wait_for_last_add_confirmed_update(
        &self,
        ledger_id: LedgerId,
        previous_lac: EntryId,
        watcher: Arc<dyn LacWatcher>,
    ) -> StorageResult<bool> {
        self.enter(StorageOp::WaitForLacUpdate)?;
        self.inner.wait_for_last_add_confirmed_update(ledger_id, previous_lac, watcher)
    }

    fn cancel_wait_for_last_add_confirmed_update(
        &self,
        ledger_id: LedgerId,
        watcher: &Arc<dyn LacWatcher>,
    ) -> StorageResult<()> {
        self.enter(StorageOp::CancelWaitForLacUpdate)?;
        self.inner.cancel_wait_for_last_add_confirmed_update(ledger_id, watcher)
    }

    fn get_list_of_entries_of_ledger(&self, ledger_id: LedgerId) -> StorageResult<EntryIdIter> {
        self.enter(StorageOp::ListEntries)?;
        self.inner.get_list_of_entries_of_ledger(ledger_id)
    }

    fn delete_ledger(&self, ledger_id: LedgerId) -> StorageResult<()> {
        self.enter(StorageOp::DeleteLedger)?;
        self.inner.delete_ledger(ledger_id)
    }

    fn register_ledger_deletion_listener(&self, listener: Weak<dyn LedgerDeletionListener>) {
        self.inner.register_ledger_deletion_listener(listener);
    }
}
