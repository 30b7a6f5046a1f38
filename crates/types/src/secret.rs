//! Ledger master keys.
//!
//! The master key is the sole authorization factor for both the writer and
//! the readers of a ledger, so comparisons never exit early on the first
//! differing byte.

use std::fmt;

use bytes::Bytes;
use subtle::{Choice, ConstantTimeEq};

/// Opaque authorization secret fixed when a ledger handle is created.
///
/// An empty key is a valid key and matches only another empty key.
#[derive(Clone, Default)]
pub struct MasterKey(Bytes);

impl MasterKey {
    /// Creates a master key from raw bytes.
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares `supplied` against this key in time proportional to the
    /// stored key length only.
    pub fn matches(&self, supplied: &[u8]) -> bool {
        let stored = self.as_bytes();
        let mut equal: Choice = (stored.len() as u64).ct_eq(&(supplied.len() as u64));
        for (i, byte) in stored.iter().enumerate() {
            let other = supplied.get(i).copied().unwrap_or(0);
            equal &= byte.ct_eq(&other);
        }
        equal.into()
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.as_bytes())
    }
}

impl Eq for MasterKey {}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED; {}])", self.0.len())
    }
}

impl From<Vec<u8>> for MasterKey {
    fn from(key: Vec<u8>) -> Self {
        Self::new(key)
    }
}

impl From<&[u8]> for MasterKey {
    fn from(key: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(key))
    }
}

impl<const N: usize> From<[u8; N]> for MasterKey {
    fn from(key: [u8; N]) -> Self {
        Self::new(key.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for MasterKey {
    fn from(key: &[u8; N]) -> Self {
        Self::new(Bytes::copy_from_slice(key))
    }
}
