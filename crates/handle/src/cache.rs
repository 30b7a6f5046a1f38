//! Handle cache: one live handle per ledger.
//!
//! The cache is the only way callers should obtain handles. It guarantees
//! that concurrent callers for the same ledger share one [`LedgerHandle`]
//! and therefore one fencing state, checks the caller's master key on every
//! lookup, and refuses to hand out writable handles for ledgers that were
//! fenced and then deleted, unless the journal is being replayed.

use std::{sync::Arc, time::Instant};

use dashmap::DashMap;
use ledger_host_storage::{LedgerDeletionListener, LedgerStorage};
use ledger_host_types::{LedgerId, MasterKey, StorageError, config::HandleConfig};
use tracing::{debug, info, instrument};

use crate::{
    descriptor::LedgerDescriptor,
    error::{HandleError, LedgerFencedAndDeletedSnafu, Result, UnauthorizedAccessSnafu},
    handle::LedgerHandle,
    metrics,
    read_only::ReadOnlyLedgerHandle,
};

/// Thread-safe map from ledger id to its writable and read-only handles.
///
/// Registers itself with the record store as a deletion listener, holding
/// only a weak reference so the store does not keep the cache alive.
pub struct HandleCache {
    storage: Arc<dyn LedgerStorage>,
    config: HandleConfig,
    ledgers: DashMap<LedgerId, Arc<LedgerHandle>>,
    read_only_ledgers: DashMap<LedgerId, Arc<ReadOnlyLedgerHandle>>,
    /// Ledgers deleted while fenced, with the time they were deleted.
    recently_fenced_and_deleted: DashMap<LedgerId, Instant>,
}

impl HandleCache {
    /// Creates a cache over `storage` and subscribes it to ledger deletions.
    pub fn new(storage: Arc<dyn LedgerStorage>, config: HandleConfig) -> Arc<Self> {
        let cache = Arc::new(Self {
            storage: Arc::clone(&storage),
            config,
            ledgers: DashMap::new(),
            read_only_ledgers: DashMap::new(),
            recently_fenced_and_deleted: DashMap::new(),
        });
        let listener = Arc::downgrade(&cache);
        storage.register_ledger_deletion_listener(listener);
        cache
    }

    /// Returns the writable handle for `ledger_id`, creating it on first use.
    ///
    /// Creation binds `master_key` in the store and happens exactly once per
    /// ledger, however many callers race. The supplied key is then checked
    /// against the handle on every call.
    ///
    /// # Errors
    ///
    /// - `LedgerFencedAndDeleted` if the ledger was recently fenced and
    ///   deleted and `journal_replay` is false
    /// - `UnauthorizedAccess` if `master_key` does not match the cached
    ///   handle or the key already stored for the ledger
    /// - `Storage` if the store fails
    #[instrument(skip(self, master_key))]
    pub fn get_handle(
        &self,
        ledger_id: LedgerId,
        master_key: &[u8],
        journal_replay: bool,
    ) -> Result<Arc<LedgerHandle>> {
        self.lookup_or_create(ledger_id, master_key, journal_replay)
            .and_then(|handle| handle.check_access(master_key).map(|()| handle))
            .inspect_err(|e| metrics::record_handle_error(e.code()))
    }

    /// Returns a read-only handle for an existing ledger.
    ///
    /// # Errors
    ///
    /// Returns `HandleError::Storage` with `StorageError::NoLedger` if the
    /// ledger does not exist.
    #[instrument(skip(self))]
    pub fn get_read_only_handle(&self, ledger_id: LedgerId) -> Result<Arc<ReadOnlyLedgerHandle>> {
        if let Some(handle) = self.read_only_ledgers.get(&ledger_id).map(|h| Arc::clone(h.value())) {
            return Ok(handle);
        }

        let handle = self
            .read_only_ledgers
            .entry(ledger_id)
            .or_try_insert_with(|| {
                ReadOnlyLedgerHandle::open(ledger_id, Arc::clone(&self.storage)).map(Arc::new)
            })
            .inspect_err(|e| metrics::record_handle_error(e.code()))?
            .value()
            .clone();
        metrics::set_cached_handles("read_only", self.read_only_ledgers.len());
        Ok(handle)
    }

    /// Returns true while `ledger_id` is remembered as fenced and deleted.
    pub fn is_recently_fenced_and_deleted(&self, ledger_id: LedgerId) -> bool {
        self.recently_fenced_and_deleted
            .get(&ledger_id)
            .is_some_and(|deleted_at| deleted_at.elapsed() < self.config.recently_deleted_ttl)
    }

    /// Number of cached writable handles.
    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    /// Returns true when no writable handle is cached.
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    /// Configuration the cache was built with.
    pub fn config(&self) -> &HandleConfig {
        &self.config
    }

    fn lookup_or_create(
        &self,
        ledger_id: LedgerId,
        master_key: &[u8],
        journal_replay: bool,
    ) -> Result<Arc<LedgerHandle>> {
        if let Some(handle) = self.ledgers.get(&ledger_id).map(|h| Arc::clone(h.value())) {
            return Ok(handle);
        }
        if !journal_replay && self.is_recently_fenced_and_deleted(ledger_id) {
            debug!(ledger_id = %ledger_id, "Refusing handle for fenced and deleted ledger");
            return LedgerFencedAndDeletedSnafu { ledger_id }.fail();
        }

        let handle = self
            .ledgers
            .entry(ledger_id)
            .or_try_insert_with(|| {
                self.check_stored_key(ledger_id, master_key)?;
                debug!(ledger_id = %ledger_id, journal_replay, "Creating ledger handle");
                LedgerHandle::create(
                    ledger_id,
                    MasterKey::from(master_key),
                    Arc::clone(&self.storage),
                    &self.config,
                )
                .map(Arc::new)
            })?
            .value()
            .clone();
        metrics::set_cached_handles("writable", self.ledgers.len());
        Ok(handle)
    }

    /// A ledger already in the store keeps the key it was created with; a
    /// caller presenting another one is unauthorized.
    fn check_stored_key(&self, ledger_id: LedgerId, master_key: &[u8]) -> Result<()> {
        let stored = match self.storage.read_master_key(ledger_id) {
            Ok(stored) => stored,
            Err(StorageError::NoLedger { .. }) => return Ok(()),
            Err(source) => return Err(HandleError::Storage { source }),
        };
        if stored.matches(master_key) {
            return Ok(());
        }
        debug!(ledger_id = %ledger_id, "Master key mismatch for stored ledger");
        metrics::record_unauthorized_access();
        UnauthorizedAccessSnafu { ledger_id }.fail()
    }

    fn remember_fenced_and_deleted(&self, ledger_id: LedgerId) {
        let ttl = self.config.recently_deleted_ttl;
        let capacity = self.config.recently_deleted_capacity;

        if self.recently_fenced_and_deleted.len() >= capacity {
            self.recently_fenced_and_deleted.retain(|_, deleted_at| deleted_at.elapsed() < ttl);
        }

        // Still full: drop the oldest tenth.
        let len = self.recently_fenced_and_deleted.len();
        if len >= capacity {
            let mut by_age: Vec<(LedgerId, Instant)> = self
                .recently_fenced_and_deleted
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect();
            by_age.sort_unstable_by_key(|(_, deleted_at)| *deleted_at);
            let excess = (len + 1 - capacity).max(capacity / 10);
            for (id, _) in by_age.into_iter().take(excess) {
                self.recently_fenced_and_deleted.remove(&id);
            }
            metrics::record_recently_deleted_evictions(excess);
        }

        self.recently_fenced_and_deleted.insert(ledger_id, Instant::now());
    }
}

impl LedgerDeletionListener for HandleCache {
    fn ledger_deleted(&self, ledger_id: LedgerId, was_fenced: bool) {
        if was_fenced && self.ledgers.contains_key(&ledger_id) {
            info!(ledger_id = %ledger_id, "Fenced ledger deleted");
            self.remember_fenced_and_deleted(ledger_id);
        }

        self.ledgers.remove(&ledger_id);
        self.read_only_ledgers.remove(&ledger_id);
        metrics::set_cached_handles("writable", self.ledgers.len());
        metrics::set_cached_handles("read_only", self.read_only_ledgers.len());
        debug!(ledger_id = %ledger_id, "Dropped handles of deleted ledger");
    }
}

impl std::fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleCache")
            .field("ledgers", &self.ledgers.len())
            .field("read_only_ledgers", &self.read_only_ledgers.len())
            .field("recently_fenced_and_deleted", &self.recently_fenced_and_deleted.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use ledger_host_storage::{InMemoryJournal, InMemoryLedgerStorage};
    use ledger_host_types::ErrorCode;

    use super::*;

    const MIN_TTL: Duration = Duration::from_secs(1);

    fn cache() -> (Arc<HandleCache>, Arc<InMemoryLedgerStorage>) {
        let storage = Arc::new(InMemoryLedgerStorage::new());
        (HandleCache::new(storage.clone(), HandleConfig::default()), storage)
    }

    #[test]
    fn test_same_handle_for_same_ledger() {
        let (cache, _) = cache();
        let a = cache.get_handle(LedgerId::new(1), b"key", false).unwrap();
        let b = cache.get_handle(LedgerId::new(1), b"key", false).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_wrong_key_on_lookup_is_unauthorized() {
        let (cache, _) = cache();
        cache.get_handle(LedgerId::new(1), b"key", false).unwrap();
        let err = cache.get_handle(LedgerId::new(1), b"other", false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnauthorizedAccess);
    }

    #[test]
    fn test_wrong_key_for_stored_ledger_is_unauthorized() {
        let (cache, storage) = cache();
        storage.set_master_key(LedgerId::new(2), &MasterKey::from(b"key")).unwrap();

        let err = cache.get_handle(LedgerId::new(2), b"other", false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnauthorizedAccess);
        assert!(!err.is_retryable());
        assert!(cache.is_empty());

        cache.get_handle(LedgerId::new(2), b"key", false).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fenced_then_deleted_ledger_is_refused_outside_replay() {
        let (cache, storage) = cache();
        let ledger = LedgerId::new(5);
        let handle = cache.get_handle(ledger, b"key", false).unwrap();
        let outcome = handle.fence_and_log_in_journal(&InMemoryJournal::new()).unwrap();
        assert_eq!(outcome.wait_blocking(), Ok(true));

        storage.delete_ledger(ledger).unwrap();
        assert!(cache.is_empty());
        assert!(cache.is_recently_fenced_and_deleted(ledger));

        let err = cache.get_handle(ledger, b"key", false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::LedgerFencedAndDeleted);

        let replayed = cache.get_handle(ledger, b"key", true).unwrap();
        assert!(!Arc::ptr_eq(&handle, &replayed));
    }

    #[test]
    fn test_unfenced_deleted_ledger_can_be_reopened() {
        let (cache, storage) = cache();
        let ledger = LedgerId::new(6);
        cache.get_handle(ledger, b"key", false).unwrap();
        storage.delete_ledger(ledger).unwrap();
        assert!(!cache.is_recently_fenced_and_deleted(ledger));
        cache.get_handle(ledger, b"key", false).unwrap();
    }

    #[test]
    fn test_recently_deleted_is_bounded() {
        let storage = Arc::new(InMemoryLedgerStorage::new());
        let config = HandleConfig::builder().recently_deleted_capacity(2).build().unwrap();
        let cache = HandleCache::new(storage.clone(), config);

        for id in 0..3 {
            let ledger = LedgerId::new(id);
            cache.get_handle(ledger, b"k", false).unwrap().set_fenced().unwrap();
            storage.delete_ledger(ledger).unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(!cache.is_recently_fenced_and_deleted(LedgerId::new(0)), "oldest evicted");
        assert!(cache.is_recently_fenced_and_deleted(LedgerId::new(2)));
    }

    #[test]
    fn test_recently_deleted_expires() {
        let storage = Arc::new(InMemoryLedgerStorage::new());
        let config = HandleConfig::builder().recently_deleted_ttl(MIN_TTL).build().unwrap();
        let cache = HandleCache::new(storage.clone(), config);
        let ledger = LedgerId::new(1);
        cache.get_handle(ledger, b"k", false).unwrap().set_fenced().unwrap();
        storage.delete_ledger(ledger).unwrap();
        assert!(cache.is_recently_fenced_and_deleted(ledger));

        std::thread::sleep(MIN_TTL + Duration::from_millis(50));
        assert!(!cache.is_recently_fenced_and_deleted(ledger));
        cache.get_handle(ledger, b"k", false).unwrap();
    }

    #[test]
    fn test_read_only_handle_requires_existing_ledger() {
        let (cache, _) = cache();
        let err = cache.get_read_only_handle(LedgerId::new(9)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StorageNoLedger);

        cache.get_handle(LedgerId::new(9), b"key", false).unwrap();
        let a = cache.get_read_only_handle(LedgerId::new(9)).unwrap();
        let b = cache.get_read_only_handle(LedgerId::new(9)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_dropping_cache_unsubscribes() {
        let (cache, storage) = cache();
        cache.get_handle(LedgerId::new(1), b"key", false).unwrap();
        drop(cache);
        storage.delete_ledger(LedgerId::new(1)).unwrap();
    }
}
