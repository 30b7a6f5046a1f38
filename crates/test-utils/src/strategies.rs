//! Proptest strategies for ledger host domain types.
//!
//! Reusable generators for property-based testing across crates.
//!
//! # Usage
//!
//! ```no_run
//! use ledger_host_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(key in strategies::arb_master_key()) {
//!         // test invariant with a randomly generated key
//!     }
//! }
//! ```

use bytes::Bytes;
use ledger_host_types::{EntryId, LedgerId, MasterKey, codec::encode_entry};
use proptest::prelude::*;

/// Generates a non-negative ledger id.
pub fn arb_ledger_id() -> impl Strategy<Value = LedgerId> {
    (0i64..=i64::MAX).prop_map(LedgerId::new)
}

/// Generates a user entry id in `0..1_000_000`.
pub fn arb_entry_id() -> impl Strategy<Value = EntryId> {
    (0i64..1_000_000).prop_map(EntryId::new)
}

/// Generates a master key of 0-31 random bytes, including the empty key.
pub fn arb_master_key() -> impl Strategy<Value = MasterKey> {
    proptest::collection::vec(any::<u8>(), 0..32).prop_map(MasterKey::from)
}

/// Generates an entry payload of 0-255 random bytes.
pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..256)
}

/// Generates a well-formed entry for `ledger_id` with a random id, LAC and payload.
pub fn arb_entry(ledger_id: LedgerId) -> impl Strategy<Value = (EntryId, Bytes)> {
    (arb_entry_id(), arb_payload()).prop_map(move |(entry_id, payload)| {
        let lac = EntryId::new(entry_id.value() - 1);
        (entry_id, encode_entry(ledger_id, entry_id, lac, &payload))
    })
}

/// Generates byte strings shorter than a ledger id, which no handle accepts.
pub fn arb_truncated_entry() -> impl Strategy<Value = Bytes> {
    proptest::collection::vec(any::<u8>(), 0..8).prop_map(Bytes::from)
}
