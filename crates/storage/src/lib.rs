//! Record store and journal contracts for ledger-host.
//!
//! This crate provides:
//! - The record store capability trait ([`LedgerStorage`])
//! - Last-add-confirmed watch registration ([`LacWatcher`], [`WatcherSet`])
//! - Ledger deletion notification ([`LedgerDeletionListener`])
//! - The write-ahead log capability trait ([`Journal`])
//! - In-memory implementations of both collaborators for embedding and tests

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod journal;
mod ledger_storage;
mod memory;
mod watcher;

pub use journal::{InMemoryJournal, Journal, JournaledEntry, WriteCallback, WriteCompletion};
pub use ledger_storage::{LedgerDeletionListener, LedgerStorage};
pub use memory::InMemoryLedgerStorage;
pub use watcher::{LacWatcher, LastAddConfirmedUpdateNotification, WatcherSet};
