//! Fuzz target for the entry codec.
//!
//! Arbitrary bytes fed to the header readers must never panic, and every
//! reader must agree with the others about where the fields live.

#![no_main]

use libfuzzer_sys::fuzz_target;

use ledger_host_types::codec::{
    ENTRY_HEADER_LEN, EntryHeader, LAC_PIGGYBACK_LEN, LEDGER_ID_LEN, encode_entry, fence_entry,
    read_ledger_id, read_piggybacked_lac,
};

fuzz_target!(|data: &[u8]| {
    let ledger_id = read_ledger_id(data);
    let header = EntryHeader::decode(data);
    let lac = read_piggybacked_lac(data);

    assert_eq!(ledger_id.is_ok(), data.len() >= LEDGER_ID_LEN);
    assert_eq!(header.is_ok(), data.len() >= ENTRY_HEADER_LEN);
    assert_eq!(lac.is_some(), data.len() >= LAC_PIGGYBACK_LEN);

    if let (Ok(ledger_id), Ok(header)) = (ledger_id, header) {
        assert_eq!(header.ledger_id, ledger_id);

        let marker = fence_entry(ledger_id);
        let decoded = EntryHeader::decode(&marker).expect("fence marker has a header");
        assert!(decoded.is_meta());
        assert_eq!(decoded.ledger_id, ledger_id);

        if let Some(lac) = lac {
            let reencoded =
                encode_entry(header.ledger_id, header.entry_id, lac, &data[LAC_PIGGYBACK_LEN..]);
            assert_eq!(&reencoded[..], data);
        }
    }
});
