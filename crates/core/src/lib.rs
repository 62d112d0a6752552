//! Core ledger engine for Tally.
//!
//! This crate contains the double-entry business logic with ZERO web or
//! database dependencies. Persistence goes through the [`store`] traits; an
//! in-memory implementation ships here, PostgreSQL lives in `tally-db`.
//!
//! # Modules
//!
//! - `chart` - Account registry and cost centers
//! - `ledger` - Journal entries, posting engine, balances
//! - `reports` - Trial balance, balance sheet, income statement, account ledger
//! - `store` - Tenant-scoped persistence traits

pub mod chart;
pub mod ledger;
pub mod reports;
pub mod store;

pub use chart::{Account, AccountRegistry, AccountType, CostCenter, NewAccount};
pub use ledger::{
    AccountBalance, BalanceCalculator, EntryStatus, ErrorKind, JournalEntry, LedgerError,
    NewJournalEntry, NewJournalLine, PostingEngine, SourceType,
};
pub use reports::{FiscalYearStart, StatementBuilder};
pub use store::{InMemoryLedgerStore, LedgerStore, StoreError};
