//! Chart of accounts.

pub mod registry;
pub mod types;

pub use registry::AccountRegistry;
pub use types::{Account, AccountType, CostCenter, NewAccount, default_chart};
