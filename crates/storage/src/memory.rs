//! In-memory record store.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Weak},
};

use bytes::Bytes;
use ledger_host_types::{
    EntryId, EntryIdIter, LedgerId, MasterKey, StorageResult,
    codec::{self, EntryHeader},
    error::{
        DuplicateEntrySnafu, MalformedEntrySnafu, NoEntrySnafu, NoLedgerSnafu,
        OperationRejectedSnafu,
    },
};
use parking_lot::{Mutex, RwLock};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, info};

use crate::{
    ledger_storage::{LedgerDeletionListener, LedgerStorage},
    watcher::{LacWatcher, LastAddConfirmedUpdateNotification, WatcherSet},
};

#[derive(Debug)]
struct LedgerState {
    master_key: MasterKey,
    fenced: bool,
    entries: BTreeMap<EntryId, Bytes>,
    last_add_confirmed: EntryId,
    explicit_lac: Option<Bytes>,
    watchers: WatcherSet,
}

impl LedgerState {
    fn new(master_key: MasterKey) -> Self {
        Self {
            master_key,
            fenced: false,
            entries: BTreeMap::new(),
            last_add_confirmed: EntryId::INVALID,
            explicit_lac: None,
            watchers: WatcherSet::new(),
        }
    }
}

/// In-memory record store.
///
/// All data is lost when the store is dropped. Entries must carry the 16-byte
/// (ledger id, entry id) header; entries long enough to piggyback a LAC advance
/// the ledger's LAC, which never moves backwards. Writes to fenced ledgers are
/// accepted. Deletion listeners run after a ledger's state is dropped and are
/// told whether it was fenced.
#[derive(Default)]
pub struct InMemoryLedgerStorage {
    ledgers: RwLock<HashMap<LedgerId, LedgerState>>,
    listeners: Mutex<Vec<Weak<dyn LedgerDeletionListener>>>,
}

impl InMemoryLedgerStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledgers currently held.
    pub fn ledger_count(&self) -> usize {
        self.ledgers.read().len()
    }

    /// Number of LAC watchers registered on `ledger_id`.
    pub fn watcher_count(&self, ledger_id: LedgerId) -> usize {
        self.ledgers.read().get(&ledger_id).map_or(0, |state| state.watchers.len())
    }

    fn with_ledger<T>(
        &self,
        ledger_id: LedgerId,
        f: impl FnOnce(&LedgerState) -> T,
    ) -> StorageResult<T> {
        let ledgers = self.ledgers.read();
        let state = ledgers.get(&ledger_id).context(NoLedgerSnafu { ledger_id })?;
        Ok(f(state))
    }

    fn with_ledger_mut<T>(
        &self,
        ledger_id: LedgerId,
        f: impl FnOnce(&mut LedgerState) -> T,
    ) -> StorageResult<T> {
        let mut ledgers = self.ledgers.write();
        let state = ledgers.get_mut(&ledger_id).context(NoLedgerSnafu { ledger_id })?;
        Ok(f(state))
    }
}

impl std::fmt::Debug for InMemoryLedgerStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedgerStorage")
            .field("ledgers", &self.ledgers.read().len())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl LedgerStorage for InMemoryLedgerStorage {
    fn set_master_key(&self, ledger_id: LedgerId, master_key: &MasterKey) -> StorageResult<()> {
        let mut ledgers = self.ledgers.write();
        match ledgers.get(&ledger_id) {
            Some(state) => {
                ensure!(
                    state.master_key.matches(master_key.as_bytes()),
                    OperationRejectedSnafu {
                        reason: format!("master key mismatch for {ledger_id}"),
                    }
                );
            },
            None => {
                debug!(ledger_id = %ledger_id, "Creating ledger");
                ledgers.insert(ledger_id, LedgerState::new(master_key.clone()));
            },
        }
        Ok(())
    }

    fn read_master_key(&self, ledger_id: LedgerId) -> StorageResult<MasterKey> {
        self.with_ledger(ledger_id, |state| state.master_key.clone())
    }

    fn ledger_exists(&self, ledger_id: LedgerId) -> StorageResult<bool> {
        Ok(self.ledgers.read().contains_key(&ledger_id))
    }

    fn add_entry(&self, entry: Bytes) -> StorageResult<EntryId> {
        let header = EntryHeader::decode(&entry).context(MalformedEntrySnafu)?;
        let EntryHeader { ledger_id, entry_id } = header;
        ensure!(
            !header.is_meta(),
            OperationRejectedSnafu { reason: format!("{entry_id} is reserved for meta entries") }
        );
        let piggybacked_lac = codec::read_piggybacked_lac(&entry);

        let ready = {
            let mut ledgers = self.ledgers.write();
            let state = ledgers.get_mut(&ledger_id).context(NoLedgerSnafu { ledger_id })?;
            ensure!(
                !state.entries.contains_key(&entry_id),
                DuplicateEntrySnafu { ledger_id, entry_id }
            );
            state.entries.insert(entry_id, entry);

            match piggybacked_lac {
                Some(lac) if lac > state.last_add_confirmed => {
                    state.last_add_confirmed = lac;
                    state.watchers.take_ready(lac).into_iter().map(|w| (w, lac)).collect()
                },
                _ => Vec::new(),
            }
        };

        for (watcher, lac) in ready {
            let notification = LastAddConfirmedUpdateNotification { ledger_id, last_add_confirmed: lac };
            watcher.update(notification);
        }
        Ok(entry_id)
    }

    fn get_entry(&self, ledger_id: LedgerId, entry_id: EntryId) -> StorageResult<Bytes> {
        let ledgers = self.ledgers.read();
        let state = ledgers.get(&ledger_id).context(NoLedgerSnafu { ledger_id })?;
        let entry_id =
            if entry_id == EntryId::LAST_ADD_CONFIRMED { state.last_add_confirmed } else { entry_id };
        state.entries.get(&entry_id).cloned().context(NoEntrySnafu { ledger_id, entry_id })
    }

    fn set_fenced(&self, ledger_id: LedgerId) -> StorageResult<bool> {
        let transitioned =
            self.with_ledger_mut(ledger_id, |state| !std::mem::replace(&mut state.fenced, true))?;
        if transitioned {
            info!(ledger_id = %ledger_id, "Ledger fenced");
        }
        Ok(transitioned)
    }

    fn is_fenced(&self, ledger_id: LedgerId) -> StorageResult<bool> {
        self.with_ledger(ledger_id, |state| state.fenced)
    }

    fn set_explicit_lac(&self, ledger_id: LedgerId, lac: Bytes) -> StorageResult<()> {
        self.with_ledger_mut(ledger_id, |state| state.explicit_lac = Some(lac))
    }

    fn get_explicit_lac(&self, ledger_id: LedgerId) -> StorageResult<Option<Bytes>> {
        self.with_ledger(ledger_id, |state| state.explicit_lac.clone())
    }

    fn get_last_add_confirmed(&self, ledger_id: LedgerId) -> StorageResult<EntryId> {
        self.with_ledger(ledger_id, |state| state.last_add_confirmed)
    }

    fn wait_for_last_add_confirmed_update(
        &self,
        ledger_id: LedgerId,
        previous_lac: EntryId,
        watcher: Arc<dyn LacWatcher>,
    ) -> StorageResult<bool> {
        self.with_ledger_mut(ledger_id, |state| {
            if state.last_add_confirmed > previous_lac {
                return false;
            }
            state.watchers.register(previous_lac, watcher);
            true
        })
    }

    fn cancel_wait_for_last_add_confirmed_update(
        &self,
        ledger_id: LedgerId,
        watcher: &Arc<dyn LacWatcher>,
    ) -> StorageResult<()> {
        if let Some(state) = self.ledgers.write().get_mut(&ledger_id) {
            state.watchers.cancel(watcher);
        }
        Ok(())
    }

    fn get_list_of_entries_of_ledger(&self, ledger_id: LedgerId) -> StorageResult<EntryIdIter> {
        let ids: Vec<EntryId> =
            self.with_ledger(ledger_id, |state| state.entries.keys().copied().collect())?;
        Ok(Box::new(ids.into_iter()))
    }

    fn delete_ledger(&self, ledger_id: LedgerId) -> StorageResult<()> {
        let state = self.ledgers.write().remove(&ledger_id).context(NoLedgerSnafu { ledger_id })?;
        info!(ledger_id = %ledger_id, fenced = state.fenced, "Ledger deleted");

        let listeners: Vec<Arc<dyn LedgerDeletionListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.ledger_deleted(ledger_id, state.fenced);
        }
        Ok(())
    }

    fn register_ledger_deletion_listener(&self, listener: Weak<dyn LedgerDeletionListener>) {
        self.listeners.lock().push(listener);
    }
}
