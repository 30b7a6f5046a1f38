//! Entry validation, reads and LAC passthroughs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use bytes::Bytes;
use ledger_host_handle::{HandleCache, HandleError, LedgerDescriptor};
use ledger_host_storage::{
    LacWatcher, LastAddConfirmedUpdateNotification, LedgerStorage,
};
use ledger_host_test_utils::{
    FaultyStorage, StorageOp, init_tracing, strategies, test_handle_config,
};
use ledger_host_types::{
    EntryId, ErrorCode, LedgerId, MasterKey, StorageError, codec::encode_entry,
};
use parking_lot::Mutex;
use proptest::prelude::*;

fn setup() -> (Arc<FaultyStorage>, Arc<HandleCache>) {
    init_tracing();
    let storage = Arc::new(FaultyStorage::new());
    let cache = HandleCache::new(storage.clone(), test_handle_config());
    (storage, cache)
}

#[derive(Default)]
struct RecordingWatcher {
    seen: Mutex<Vec<LastAddConfirmedUpdateNotification>>,
}

impl LacWatcher for RecordingWatcher {
    fn update(&self, notification: LastAddConfirmedUpdateNotification) {
        self.seen.lock().push(notification);
    }
}

#[test]
fn test_ledger_123_scenario() {
    let (storage, cache) = setup();
    let ledger = LedgerId::new(123);
    let handle = cache.get_handle(ledger, &[1, 2, 3, 4], false).unwrap();

    let entry = encode_entry(ledger, EntryId::new(0), EntryId::INVALID, b"payload");
    assert_eq!(handle.add_entry(entry.clone()).unwrap(), EntryId::new(0));
    assert_eq!(handle.read_entry(EntryId::new(0)).unwrap(), entry);

    let foreign = encode_entry(LedgerId::new(456), EntryId::new(1), EntryId::INVALID, b"payload");
    let err = handle.add_entry(foreign).unwrap_err();
    assert_eq!(err.code(), ErrorCode::LedgerIdMismatch);
    let message = err.to_string();
    assert!(message.contains("456") && message.contains("123"), "{message}");
    assert_eq!(storage.calls(StorageOp::AddEntry), 1);

    let denied = handle.check_access(&[5, 6, 7, 8]).unwrap_err();
    assert_eq!(denied.code(), ErrorCode::UnauthorizedAccess);
    handle.check_access(&[1, 2, 3, 4]).unwrap();
}

#[test]
fn test_short_entry_never_reaches_store() {
    let (storage, cache) = setup();
    let handle = cache.get_handle(LedgerId::new(1), b"k", false).unwrap();

    let err = handle.add_entry(Bytes::from_static(&[0, 0, 0, 1])).unwrap_err();
    assert!(matches!(err, HandleError::EntryTooShort { len: 4, required: 8 }));
    assert_eq!(storage.calls(StorageOp::AddEntry), 0);
}

#[test]
fn test_store_errors_propagate_verbatim() {
    let (storage, cache) = setup();
    let ledger = LedgerId::new(2);
    let handle = cache.get_handle(ledger, b"k", false).unwrap();

    let entry = encode_entry(ledger, EntryId::new(0), EntryId::INVALID, b"");
    handle.add_entry(entry.clone()).unwrap();
    let duplicate = handle.add_entry(entry).unwrap_err();
    assert!(matches!(duplicate, HandleError::Storage { source: StorageError::DuplicateEntry { .. } }));

    let missing = handle.read_entry(EntryId::new(9)).unwrap_err();
    assert_eq!(missing.code(), ErrorCode::StorageNoEntry);

    storage.fail_next(StorageOp::GetEntry, 1, || StorageError::Io {
        source: std::io::Error::other("read failed"),
    });
    let io = handle.read_entry(EntryId::new(0)).unwrap_err();
    assert_eq!(io.code(), ErrorCode::StorageIo);
    assert!(io.is_retryable());
}

#[test]
fn test_writes_after_fence_follow_store_policy() {
    let (_storage, cache) = setup();
    let ledger = LedgerId::new(3);
    let handle = cache.get_handle(ledger, b"k", false).unwrap();
    handle.set_fenced().unwrap();

    let entry = encode_entry(ledger, EntryId::new(0), EntryId::INVALID, b"late");
    assert_eq!(handle.add_entry(entry).unwrap(), EntryId::new(0));
}

#[test]
fn test_lac_watch_through_handle() {
    let (_storage, cache) = setup();
    let ledger = LedgerId::new(4);
    let handle = cache.get_handle(ledger, b"k", false).unwrap();
    let recorder = Arc::new(RecordingWatcher::default());
    let watcher: Arc<dyn LacWatcher> = recorder.clone();

    assert_eq!(handle.get_last_add_confirmed().unwrap(), EntryId::INVALID);
    assert!(handle.wait_for_last_add_confirmed_update(EntryId::INVALID, Arc::clone(&watcher)).unwrap());

    handle.add_entry(encode_entry(ledger, EntryId::new(0), EntryId::INVALID, b"a")).unwrap();
    assert!(recorder.seen.lock().is_empty());
    handle.add_entry(encode_entry(ledger, EntryId::new(1), EntryId::new(0), b"b")).unwrap();

    assert_eq!(
        *recorder.seen.lock(),
        vec![LastAddConfirmedUpdateNotification { ledger_id: ledger, last_add_confirmed: EntryId::new(0) }]
    );
    assert_eq!(handle.get_last_add_confirmed().unwrap(), EntryId::new(0));
    assert_eq!(handle.read_entry(EntryId::LAST_ADD_CONFIRMED).unwrap().len(), 25);

    // LAC already past the caller's view: nothing is registered.
    assert!(!handle.wait_for_last_add_confirmed_update(EntryId::INVALID, Arc::clone(&watcher)).unwrap());
}

#[test]
fn test_cancelled_watch_is_not_notified() {
    let (_storage, cache) = setup();
    let ledger = LedgerId::new(5);
    let handle = cache.get_handle(ledger, b"k", false).unwrap();
    let recorder = Arc::new(RecordingWatcher::default());
    let watcher: Arc<dyn LacWatcher> = recorder.clone();

    assert!(handle.wait_for_last_add_confirmed_update(EntryId::INVALID, Arc::clone(&watcher)).unwrap());
    handle.cancel_wait_for_last_add_confirmed_update(&watcher).unwrap();
    handle.cancel_wait_for_last_add_confirmed_update(&watcher).unwrap();

    handle.add_entry(encode_entry(ledger, EntryId::new(0), EntryId::new(0), b"a")).unwrap();
    assert!(recorder.seen.lock().is_empty());
}

#[test]
fn test_explicit_lac_roundtrip() {
    let (_storage, cache) = setup();
    let handle = cache.get_handle(LedgerId::new(6), b"k", false).unwrap();

    assert_eq!(handle.get_explicit_lac().unwrap(), None);
    handle.set_explicit_lac(Bytes::from_static(b"explicit")).unwrap();
    assert_eq!(handle.get_explicit_lac().unwrap(), Some(Bytes::from_static(b"explicit")));
}

#[test]
fn test_list_entries_uses_requested_ledger() {
    let (storage, cache) = setup();
    let mine = LedgerId::new(7);
    let other = LedgerId::new(8);
    let handle = cache.get_handle(mine, b"k", false).unwrap();
    storage.set_master_key(other, &MasterKey::from(b"o")).unwrap();
    for id in [2, 0, 1] {
        storage.add_entry(encode_entry(other, EntryId::new(id), EntryId::INVALID, b"")).unwrap();
    }

    let ids: Vec<EntryId> = handle.get_list_of_entries_of_ledger(other).unwrap().collect();
    assert_eq!(ids, vec![EntryId::new(0), EntryId::new(1), EntryId::new(2)]);
    assert_eq!(handle.get_list_of_entries_of_ledger(mine).unwrap().count(), 0);
}

proptest! {
    #[test]
    fn prop_foreign_entries_are_rejected(
        ledger in strategies::arb_ledger_id(),
        foreign in strategies::arb_ledger_id(),
        payload in strategies::arb_payload(),
    ) {
        prop_assume!(ledger != foreign);
        let (storage, cache) = setup();
        let handle = cache.get_handle(ledger, b"k", false).unwrap();

        let entry = encode_entry(foreign, EntryId::new(0), EntryId::INVALID, &payload);
        let err = handle.add_entry(entry).unwrap_err();
        let message = err.to_string();
        prop_assert!(message.contains(&foreign.value().to_string()));
        prop_assert!(message.contains(&ledger.value().to_string()));
        prop_assert_eq!(storage.calls(StorageOp::AddEntry), 0);
    }

    #[test]
    fn prop_access_requires_exact_key(
        key in strategies::arb_master_key(),
        supplied in proptest::collection::vec(any::<u8>(), 0..32),
    ) {
        let (_storage, cache) = setup();
        let ledger = LedgerId::new(1);
        let handle = cache.get_handle(ledger, key.as_bytes(), false).unwrap();

        prop_assert!(handle.check_access(key.as_bytes()).is_ok());
        prop_assert_eq!(handle.check_access(&supplied).is_ok(), supplied.as_slice() == key.as_bytes());
    }

    #[test]
    fn prop_entries_are_stored_under_their_own_id(
        (entry_id, entry) in strategies::arb_entry(LedgerId::new(11)),
    ) {
        let (storage, cache) = setup();
        let handle = cache.get_handle(LedgerId::new(11), b"k", false).unwrap();

        prop_assert_eq!(handle.add_entry(entry.clone()).unwrap(), entry_id);
        prop_assert_eq!(handle.read_entry(entry_id).unwrap(), entry);
        prop_assert_eq!(storage.calls(StorageOp::AddEntry), 1);
    }

    #[test]
    fn prop_truncated_entries_are_too_short(entry in strategies::arb_truncated_entry()) {
        let (storage, cache) = setup();
        let handle = cache.get_handle(LedgerId::new(1), b"k", false).unwrap();
        let is_too_short = matches!(handle.add_entry(entry), Err(HandleError::EntryTooShort { .. }));
        prop_assert!(is_too_short);
        prop_assert_eq!(storage.calls(StorageOp::AddEntry), 0);
    }
}
