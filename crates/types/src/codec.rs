//! Entry layout and meta-entry encoding.
//!
//! Every entry starts with a big-endian header:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────┬─────────────┐
//! │ ledger id    │ entry id     │ LAC (optional)   │ payload ... │
//! │ i64 BE, 0..8 │ i64 BE, 8..16│ i64 BE, 16..24   │             │
//! └──────────────┴──────────────┴──────────────────┴─────────────┘
//! ```
//!
//! Handles only need the ledger id to route a write. Stores need the full
//! 16-byte header and pick up the piggybacked last-add-confirmed when the
//! entry is long enough to carry one.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use snafu::{Snafu, ensure};

use crate::types::{EntryId, LedgerId};

/// Bytes occupied by the ledger id prefix.
pub const LEDGER_ID_LEN: usize = 8;

/// Bytes occupied by the (ledger id, entry id) header.
pub const ENTRY_HEADER_LEN: usize = 16;

/// Offset of the piggybacked last-add-confirmed.
pub const LAC_OFFSET: usize = 16;

/// Minimum entry length that carries a piggybacked last-add-confirmed.
pub const LAC_PIGGYBACK_LEN: usize = 24;

/// Meta entry id carrying a ledger's master key.
pub const METAENTRY_ID_LEDGER_KEY: EntryId = EntryId::new(-0x1000);

/// Meta entry id marking a ledger as fenced.
pub const METAENTRY_ID_FENCE_KEY: EntryId = EntryId::new(-0x2000);

/// Meta entry id carrying an explicit last-add-confirmed.
pub const METAENTRY_ID_LEDGER_EXPLICITLAC: EntryId = EntryId::new(-0x8000);

/// Error type for entry decoding.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CodecError {
    /// Buffer too short for the field being read.
    #[snafu(display("Entry of {len} bytes is too short, need at least {required}"))]
    TooShort {
        /// Actual buffer length.
        len: usize,
        /// Bytes required.
        required: usize,
    },
}

/// Reads the big-endian ledger id from the first 8 bytes of `entry`.
///
/// # Errors
///
/// Returns [`CodecError::TooShort`] when `entry` holds fewer than 8 bytes.
pub fn read_ledger_id(entry: &[u8]) -> Result<LedgerId, CodecError> {
    ensure!(entry.len() >= LEDGER_ID_LEN, TooShortSnafu { len: entry.len(), required: LEDGER_ID_LEN });
    Ok(LedgerId::new(BigEndian::read_i64(&entry[..LEDGER_ID_LEN])))
}

/// The (ledger id, entry id) prefix of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Ledger the entry belongs to.
    pub ledger_id: LedgerId,
    /// Entry id within the ledger.
    pub entry_id: EntryId,
}

impl EntryHeader {
    /// Decodes the 16-byte header.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TooShort`] when `entry` holds fewer than 16 bytes.
    pub fn decode(entry: &[u8]) -> Result<Self, CodecError> {
        ensure!(
            entry.len() >= ENTRY_HEADER_LEN,
            TooShortSnafu { len: entry.len(), required: ENTRY_HEADER_LEN }
        );
        Ok(Self {
            ledger_id: LedgerId::new(BigEndian::read_i64(&entry[0..8])),
            entry_id: EntryId::new(BigEndian::read_i64(&entry[8..16])),
        })
    }

    /// Returns true when the header addresses a journal meta entry.
    pub fn is_meta(&self) -> bool {
        !self.entry_id.is_user_entry()
    }
}

/// Reads the last-add-confirmed piggybacked at offset 16, if present.
pub fn read_piggybacked_lac(entry: &[u8]) -> Option<EntryId> {
    if entry.len() < LAC_PIGGYBACK_LEN {
        return None;
    }
    Some(EntryId::new(BigEndian::read_i64(&entry[LAC_OFFSET..LAC_PIGGYBACK_LEN])))
}

/// Encodes a user entry: header, piggybacked LAC, then `payload`.
pub fn encode_entry(
    ledger_id: LedgerId,
    entry_id: EntryId,
    lac: EntryId,
    payload: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(LAC_PIGGYBACK_LEN + payload.len());
    buf.put_i64(ledger_id.value());
    buf.put_i64(entry_id.value());
    buf.put_i64(lac.value());
    buf.put_slice(payload);
    buf.freeze()
}

/// Builds the 16-byte journal marker recording that `ledger_id` is fenced.
pub fn fence_entry(ledger_id: LedgerId) -> Bytes {
    let mut buf = BytesMut::with_capacity(ENTRY_HEADER_LEN);
    buf.put_i64(ledger_id.value());
    buf.put_i64(METAENTRY_ID_FENCE_KEY.value());
    buf.freeze()
}
