//! Core types, errors, and configuration for ledger-host.
//!
//! This crate provides the foundational types shared by the record store,
//! the journal, and ledger handles:
//! - Identifier newtypes ([`LedgerId`], [`EntryId`])
//! - Ledger master keys with constant-time comparison ([`MasterKey`])
//! - The entry layout and the fence marker encoding ([`codec`])
//! - Error types using snafu
//! - Handle configuration
//! - Cooperative per-thread interruption ([`interrupt`])

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod secret;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ErrorCode, JournalError, ReturnCode, StorageError, StorageResult};
pub use secret::MasterKey;
pub use types::*;
