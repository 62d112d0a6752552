//! Financial statements.
//!
//! - Trial Balance
//! - Balance Sheet
//! - Income Statement
//! - Account Ledger
//!
//! Every statement is computed from a single read snapshot, in the tenant's
//! base currency.

pub mod fiscal;
pub mod service;
pub mod types;


pub use fiscal::FiscalYearStart;
pub use service::StatementBuilder;
pub use types::*;
