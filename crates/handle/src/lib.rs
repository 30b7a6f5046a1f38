//! Per-ledger access control and fencing for ledger-host.
//!
//! A [`LedgerHandle`] is the single gatekeeper for one ledger on this storage
//! host. It checks the master key on access, routes entry writes and reads
//! to the record store, and runs the fencing protocol: the irreversible
//! transition that closes a ledger for writing and records that closure in
//! the journal exactly once.
//!
//! Handles are obtained from a [`HandleCache`], which guarantees that every
//! caller for the same ledger shares the same fencing state.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ledger_host_handle::{HandleCache, LedgerDescriptor};
//! use ledger_host_storage::{InMemoryJournal, InMemoryLedgerStorage};
//! use ledger_host_types::{LedgerId, config::HandleConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(InMemoryLedgerStorage::new());
//! let journal = InMemoryJournal::new();
//! let cache = HandleCache::new(storage, HandleConfig::default());
//!
//! let handle = cache.get_handle(LedgerId::new(1), b"secret", false)?;
//! let persisted = handle.fence_and_log_in_journal(&journal)?.await?;
//! assert!(persisted);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod descriptor;
pub mod error;
mod handle;
pub mod metrics;
mod outcome;
mod read_only;

pub use cache::HandleCache;
pub use descriptor::LedgerDescriptor;
pub use error::{FenceError, HandleError, Result};
pub use handle::LedgerHandle;
pub use outcome::FenceOutcome;
pub use read_only::ReadOnlyLedgerHandle;
