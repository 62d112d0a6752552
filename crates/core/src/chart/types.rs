//! Chart of accounts domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, CostCenterId, TenantId};

use crate::ledger::balance::NormalBalance;
use crate::ledger::error::LedgerError;

/// Longest account or cost center code accepted.
pub const MAX_CODE_LEN: usize = 20;

/// Account classification.
///
/// Determines the normal balance side and which statement an account
/// appears on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Owners' residual interest.
    Equity,
    /// Income earned.
    Revenue,
    /// Costs incurred.
    Expense,
}

impl AccountType {
    /// Every account type, in statement order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }

    /// Parses an account type, ignoring case.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASSET" => Ok(Self::Asset),
            "LIABILITY" => Ok(Self::Liability),
            "EQUITY" => Ok(Self::Equity),
            "REVENUE" => Ok(Self::Revenue),
            "EXPENSE" => Ok(Self::Expense),
            _ => Err(LedgerError::InvalidAccountType(s.to_string())),
        }
    }

    /// Asset and Expense are debit-normal; the rest are credit-normal.
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Code, unique per tenant. Frozen once any journal line references it.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// System accounts cannot be deleted.
    pub is_system: bool,
    /// Inactive accounts accept no new journal lines.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Whether the account is protected from deletion.
    pub is_system: bool,
}

impl NewAccount {
    /// Builds input from an untyped account type, as received from callers.
    pub fn parse(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: &str,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            code: code.into(),
            name: name.into(),
            account_type: AccountType::parse(account_type)?,
            is_system: false,
        })
    }

    /// Builds input for a regular (deletable) account.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            is_system: false,
        }
    }

    /// Marks the account as a protected system account.
    #[must_use]
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// Optional reporting dimension attached to journal lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCenter {
    /// Unique identifier.
    pub id: CostCenterId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Code, unique per tenant.
    pub code: String,
    /// Display name.
    pub name: String,
    /// When the cost center was created.
    pub created_at: DateTime<Utc>,
}

/// Trims a code and checks it is non-empty and short enough.
pub fn normalize_code(code: &str) -> Result<String, LedgerError> {
    let trimmed = code.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_CODE_LEN {
        return Err(LedgerError::InvalidCode(code.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Trims a name and checks it is non-empty.
pub fn normalize_name(name: &str) -> Result<String, LedgerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Starter chart seeded for new tenants.
#[must_use]
pub fn default_chart() -> Vec<NewAccount> {
    use AccountType::{Asset, Equity, Expense, Liability, Revenue};

    vec![
        NewAccount::new("1000", "Cash", Asset).system(),
        NewAccount::new("1100", "Accounts Receivable", Asset).system(),
        NewAccount::new("1200", "Inventory", Asset),
        NewAccount::new("1500", "Equipment", Asset),
        NewAccount::new("2000", "Accounts Payable", Liability).system(),
        NewAccount::new("2100", "Tax Payable", Liability).system(),
        NewAccount::new("2200", "Payroll Liabilities", Liability),
        NewAccount::new("3000", "Share Capital", Equity).system(),
        NewAccount::new("3100", "Retained Earnings", Equity).system(),
        NewAccount::new("4000", "Sales Revenue", Revenue).system(),
        NewAccount::new("4100", "Service Revenue", Revenue),
        NewAccount::new("5000", "Cost of Goods Sold", Expense),
        NewAccount::new("6000", "Salaries Expense", Expense),
        NewAccount::new("6100", "Rent Expense", Expense),
        NewAccount::new("6200", "Bank Fees", Expense),
    ]
}
