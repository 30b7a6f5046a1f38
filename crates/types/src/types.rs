//! Core identifier types for ledger-host.
//!
//! Ledgers and entries are addressed by signed 64-bit identifiers. Negative
//! entry ids are reserved for sentinels and journal meta entries.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around a numeric type for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<inner>` and `Into<inner>` conversions
/// - `Display` with a semantic prefix (e.g., `ledger:123`)
/// - `new()` constructor and `value()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $inner:ty, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Creates a new identifier from a raw value.
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value.
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = <$inner as std::str::FromStr>::Err;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<$inner>().map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a ledger on this storage host.
    ///
    /// Wraps an `i64` with compile-time type safety to prevent mixing with
    /// entry identifiers.
    ///
    /// # Display
    ///
    /// Formats with `ledger:` prefix: `ledger:42`.
    LedgerId, i64, "ledger"
);

define_id!(
    /// Per-ledger sequential identifier of an entry.
    ///
    /// User entries are numbered from zero. Negative values are sentinels
    /// ([`EntryId::INVALID`], [`EntryId::LAST_ADD_CONFIRMED`]) or journal meta
    /// entries (see [`crate::codec`]).
    ///
    /// # Display
    ///
    /// Formats with `entry:` prefix: `entry:7`.
    EntryId, i64, "entry"
);

impl EntryId {
    /// No entry. The last-add-confirmed of a ledger with nothing confirmed.
    pub const INVALID: Self = Self(-1);

    /// Read sentinel: resolves to the entry at the ledger's current LAC.
    pub const LAST_ADD_CONFIRMED: Self = Self(-1);

    /// Returns true for ids that can address user data.
    #[inline]
    pub const fn is_user_entry(self) -> bool {
        self.0 >= 0
    }
}

/// Lazy, finite, forward-only sequence of entry ids held by a store.
pub type EntryIdIter = Box<dyn Iterator<Item = EntryId> + Send>;
