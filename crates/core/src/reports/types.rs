//! Report data types.
//!
//! All amounts are in the tenant's base currency.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, CurrencyCode, JournalEntryId};

use crate::chart::types::AccountType;
use crate::ledger::balance::AccountBalance;
use crate::ledger::types::EntryStatus;

/// One account's row in a trial balance.
///
/// The net balance sits in exactly one column; the other is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    /// Account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Debit column.
    pub debit: Decimal,
    /// Credit column.
    pub credit: Decimal,
}

impl TrialBalanceRow {
    /// Places the net of an account's totals in the matching column.
    #[must_use]
    pub fn from_balance(balance: &AccountBalance) -> Self {
        let net = balance.net_debit();
        let (debit, credit) = if net >= Decimal::ZERO {
            (net, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -net)
        };
        Self {
            account_id: balance.account_id,
            code: balance.code.clone(),
            name: balance.name.clone(),
            account_type: balance.account_type,
            debit,
            credit,
        }
    }
}

/// Trial balance totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceTotals {
    /// Total debit.
    pub total_debit: Decimal,
    /// Total credit.
    pub total_credit: Decimal,
    /// Whether debits equal credits.
    pub is_balanced: bool,
}

/// Trial balance report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceReport {
    /// As of date.
    pub as_of: NaiveDate,
    /// Base currency.
    pub currency: CurrencyCode,
    /// Rows ordered by account code.
    pub rows: Vec<TrialBalanceRow>,
    /// Totals.
    pub totals: TrialBalanceTotals,
}

/// A line on a balance sheet or income statement.
///
/// Computed lines (earnings) carry no account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    /// Account ID, if the line is an account.
    pub account_id: Option<AccountId>,
    /// Account code, if the line is an account.
    pub code: Option<String>,
    /// Display name.
    pub name: String,
    /// Amount, signed by the section's normal side.
    pub amount: Decimal,
}

impl StatementLine {
    /// Line for an account balance.
    #[must_use]
    pub fn account(balance: &AccountBalance) -> Self {
        Self {
            account_id: Some(balance.account_id),
            code: Some(balance.code.clone()),
            name: balance.name.clone(),
            amount: balance.balance,
        }
    }

    /// Computed line with no account behind it.
    #[must_use]
    pub fn computed(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_id: None,
            code: None,
            name: name.into(),
            amount,
        }
    }
}

/// A group of statement lines with their total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSection {
    /// Section total.
    pub total: Decimal,
    /// Lines in this section.
    pub lines: Vec<StatementLine>,
}

impl StatementSection {
    /// Appends a line and adds it to the total.
    pub fn push(&mut self, line: StatementLine) {
        self.total += line.amount;
        self.lines.push(line);
    }
}

/// Balance sheet report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetReport {
    /// As of date.
    pub as_of: NaiveDate,
    /// Start of the fiscal year containing `as_of`.
    pub fiscal_year_start: NaiveDate,
    /// Base currency.
    pub currency: CurrencyCode,
    /// Assets section.
    pub assets: StatementSection,
    /// Liabilities section.
    pub liabilities: StatementSection,
    /// Equity section, including the computed earnings lines.
    pub equity: StatementSection,
    /// Revenue minus expenses before the fiscal year start.
    pub retained_earnings: Decimal,
    /// Revenue minus expenses from the fiscal year start to `as_of`.
    pub current_year_earnings: Decimal,
    /// Total assets.
    pub total_assets: Decimal,
    /// Total liabilities.
    pub total_liabilities: Decimal,
    /// Total equity.
    pub total_equity: Decimal,
    /// Liabilities plus equity.
    pub liabilities_and_equity: Decimal,
    /// Whether assets equal liabilities plus equity.
    pub is_balanced: bool,
}

/// Income statement report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStatementReport {
    /// Period start date.
    pub period_start: NaiveDate,
    /// Period end date.
    pub period_end: NaiveDate,
    /// Base currency.
    pub currency: CurrencyCode,
    /// Revenue section.
    pub revenue: StatementSection,
    /// Expense section.
    pub expenses: StatementSection,
    /// Total revenue.
    pub total_revenue: Decimal,
    /// Total expenses.
    pub total_expenses: Decimal,
    /// Revenue minus expenses.
    pub net_income: Decimal,
}

/// A posted line in an account ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedgerLine {
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Entry number.
    pub entry_number: i64,
    /// Entry date.
    pub entry_date: NaiveDate,
    /// Entry description.
    pub description: String,
    /// Entry status (POSTED or VOID).
    pub status: EntryStatus,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Transaction-currency debit.
    pub debit_amount: Decimal,
    /// Transaction-currency credit.
    pub credit_amount: Decimal,
    /// Base debit.
    pub base_debit: Decimal,
    /// Base credit.
    pub base_credit: Decimal,
    /// Line memo.
    pub memo: Option<String>,
    /// Balance after this line, signed by the account's normal side.
    pub running_balance: Decimal,
}

/// Activity of one account over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedgerReport {
    /// Account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Period start date.
    pub period_start: NaiveDate,
    /// Period end date.
    pub period_end: NaiveDate,
    /// Base currency.
    pub currency: CurrencyCode,
    /// Balance before `period_start`.
    pub opening_balance: Decimal,
    /// Lines within the period, in posting order.
    pub lines: Vec<AccountLedgerLine>,
    /// Base debits within the period.
    pub total_debit: Decimal,
    /// Base credits within the period.
    pub total_credit: Decimal,
    /// Balance at `period_end`.
    pub closing_balance: Decimal,
}
