//! Double-entry bookkeeping logic.
//!
//! - Journal entries and lines
//! - Line and balance validation
//! - The posting engine (DRAFT -> POSTED -> VOID)
//! - Reversing entries
//! - Balance calculations
//! - Error types for ledger operations

pub mod balance;
pub mod engine;
pub mod entry;
pub mod error;
pub mod reversal;
pub mod types;
pub mod validation;

#[cfg(test)]
mod engine_props;
#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod validation_props;

pub use balance::{AccountBalance, BalanceCalculator, NormalBalance};
pub use engine::PostingEngine;
pub use entry::{JournalEntry, JournalEntryLine, NewJournalEntry, NewJournalLine};
pub use error::{ErrorKind, LedgerError};
pub use reversal::ReversalService;
pub use types::{EntryStatus, EntryTotals, SourceType};
