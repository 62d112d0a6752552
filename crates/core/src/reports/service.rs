//! Statement generation.
//!
//! [`StatementBuilder`] reads one snapshot per report and hands the balances
//! to the pure `assemble_*` functions, which do the arithmetic.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::TenantContext;
use tally_shared::types::{AccountId, CurrencyCode};
use tracing::{debug, instrument};

use super::fiscal::FiscalYearStart;
use super::types::{
    AccountLedgerLine, AccountLedgerReport, BalanceSheetReport, IncomeStatementReport,
    StatementLine, StatementSection, TrialBalanceReport, TrialBalanceRow, TrialBalanceTotals,
};
use crate::chart::types::AccountType;
use crate::ledger::balance::{AccountBalance, balance_in, balances_in, ensure_range};
use crate::ledger::error::LedgerError;
use crate::store::{DateRange, LedgerRead, LedgerStore, PostedLine};

/// Name of the computed equity line for earnings of prior fiscal years.
pub const RETAINED_EARNINGS: &str = "Retained earnings";
/// Name of the computed equity line for earnings of the current fiscal year.
pub const CURRENT_YEAR_EARNINGS: &str = "Current year earnings";

/// Builds financial statements from posted ledger data.
pub struct StatementBuilder<S> {
    store: Arc<S>,
    fiscal_year_start: FiscalYearStart,
}

impl<S> Clone for StatementBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fiscal_year_start: self.fiscal_year_start,
        }
    }
}

impl<S: LedgerStore> StatementBuilder<S> {
    /// Creates a builder over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, fiscal_year_start: FiscalYearStart) -> Self {
        Self {
            store,
            fiscal_year_start,
        }
    }

    /// Trial balance of every account through `as_of`.
    ///
    /// Inactive accounts appear only while they carry a balance.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn trial_balance(
        &self,
        tenant: &TenantContext,
        as_of: NaiveDate,
    ) -> Result<TrialBalanceReport, LedgerError> {
        let reader = self.store.reader(tenant).await?;
        let balances = balances_in(&reader, DateRange::up_to(as_of)).await?;

        let report = Self::assemble_trial_balance(as_of, tenant.base_currency().clone(), &balances);
        debug!(
            rows = report.rows.len(),
            balanced = report.totals.is_balanced,
            "Trial balance generated"
        );
        Ok(report)
    }

    /// Balance sheet as of `as_of`.
    ///
    /// Revenue and expense balances are folded into equity as retained
    /// earnings (before the fiscal year containing `as_of`) and current year
    /// earnings (from its start through `as_of`).
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn balance_sheet(
        &self,
        tenant: &TenantContext,
        as_of: NaiveDate,
    ) -> Result<BalanceSheetReport, LedgerError> {
        let fiscal_year_start = self.fiscal_year_start.start_for(as_of)?;

        let reader = self.store.reader(tenant).await?;
        let through = balances_in(&reader, DateRange::up_to(as_of)).await?;
        let prior = balances_in(&reader, DateRange::before(fiscal_year_start)).await?;
        let current =
            balances_in(&reader, DateRange::between(fiscal_year_start, as_of)).await?;

        let report = Self::assemble_balance_sheet(
            as_of,
            fiscal_year_start,
            tenant.base_currency().clone(),
            &through,
            earnings(&prior),
            earnings(&current),
        );
        debug!(
            total_assets = %report.total_assets,
            balanced = report.is_balanced,
            "Balance sheet generated"
        );
        Ok(report)
    }

    /// Income statement for `start..=end`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidDateRange`] if `start > end`.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn income_statement(
        &self,
        tenant: &TenantContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IncomeStatementReport, LedgerError> {
        let range = ensure_range(start, end)?;
        let reader = self.store.reader(tenant).await?;
        let balances = balances_in(&reader, range).await?;

        let report = Self::assemble_income_statement(
            start,
            end,
            tenant.base_currency().clone(),
            &balances,
        );
        debug!(net_income = %report.net_income, "Income statement generated");
        Ok(report)
    }

    /// Lines of one account within `start..=end` with running balances.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidDateRange`] if `start > end`, or
    /// [`LedgerError::AccountNotFound`].
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn account_ledger(
        &self,
        tenant: &TenantContext,
        account_id: AccountId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AccountLedgerReport, LedgerError> {
        let range = ensure_range(start, end)?;
        let reader = self.store.reader(tenant).await?;
        let opening = balance_in(&reader, account_id, DateRange::before(start)).await?;
        let lines = reader.posted_lines(account_id, range).await?;

        Ok(Self::assemble_account_ledger(
            start,
            end,
            tenant.base_currency().clone(),
            &opening,
            lines,
        ))
    }
}

impl<S> StatementBuilder<S> {
    /// Trial balance from per-account balances.
    #[must_use]
    pub fn assemble_trial_balance(
        as_of: NaiveDate,
        currency: CurrencyCode,
        balances: &[AccountBalance],
    ) -> TrialBalanceReport {
        let rows: Vec<_> = balances
            .iter()
            .filter(|b| b.is_active || !b.balance.is_zero())
            .map(TrialBalanceRow::from_balance)
            .collect();
        let total_debit: Decimal = rows.iter().map(|r| r.debit).sum();
        let total_credit: Decimal = rows.iter().map(|r| r.credit).sum();

        TrialBalanceReport {
            as_of,
            currency,
            rows,
            totals: TrialBalanceTotals {
                total_debit,
                total_credit,
                is_balanced: total_debit == total_credit,
            },
        }
    }

    /// Balance sheet from cumulative balances and the two earnings figures.
    #[must_use]
    pub fn assemble_balance_sheet(
        as_of: NaiveDate,
        fiscal_year_start: NaiveDate,
        currency: CurrencyCode,
        balances: &[AccountBalance],
        retained_earnings: Decimal,
        current_year_earnings: Decimal,
    ) -> BalanceSheetReport {
        let assets = section(balances, AccountType::Asset);
        let liabilities = section(balances, AccountType::Liability);
        let mut equity = section(balances, AccountType::Equity);
        equity.push(StatementLine::computed(RETAINED_EARNINGS, retained_earnings));
        equity.push(StatementLine::computed(
            CURRENT_YEAR_EARNINGS,
            current_year_earnings,
        ));

        let total_assets = assets.total;
        let total_liabilities = liabilities.total;
        let total_equity = equity.total;
        let liabilities_and_equity = total_liabilities + total_equity;

        BalanceSheetReport {
            as_of,
            fiscal_year_start,
            currency,
            assets,
            liabilities,
            equity,
            retained_earnings,
            current_year_earnings,
            total_assets,
            total_liabilities,
            total_equity,
            liabilities_and_equity,
            is_balanced: total_assets == liabilities_and_equity,
        }
    }

    /// Income statement from balances over the period.
    #[must_use]
    pub fn assemble_income_statement(
        period_start: NaiveDate,
        period_end: NaiveDate,
        currency: CurrencyCode,
        balances: &[AccountBalance],
    ) -> IncomeStatementReport {
        let revenue = section(balances, AccountType::Revenue);
        let expenses = section(balances, AccountType::Expense);
        let total_revenue = revenue.total;
        let total_expenses = expenses.total;

        IncomeStatementReport {
            period_start,
            period_end,
            currency,
            revenue,
            expenses,
            total_revenue,
            total_expenses,
            net_income: total_revenue - total_expenses,
        }
    }

    /// Account ledger from the opening balance and the period's lines.
    #[must_use]
    pub fn assemble_account_ledger(
        period_start: NaiveDate,
        period_end: NaiveDate,
        currency: CurrencyCode,
        opening: &AccountBalance,
        lines: Vec<PostedLine>,
    ) -> AccountLedgerReport {
        let normal = opening.account_type.normal_balance();
        let mut running = opening.balance;
        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;

        let lines = lines
            .into_iter()
            .map(|posted| {
                let line = posted.line;
                total_debit += line.base_debit;
                total_credit += line.base_credit;
                running += normal.signed(line.base_debit, line.base_credit);
                AccountLedgerLine {
                    entry_id: posted.entry_id,
                    entry_number: posted.entry_number,
                    entry_date: posted.entry_date,
                    description: posted.description,
                    status: posted.status,
                    currency: line.currency,
                    debit_amount: line.debit_amount,
                    credit_amount: line.credit_amount,
                    base_debit: line.base_debit,
                    base_credit: line.base_credit,
                    memo: line.memo,
                    running_balance: running,
                }
            })
            .collect();

        AccountLedgerReport {
            account_id: opening.account_id,
            code: opening.code.clone(),
            name: opening.name.clone(),
            account_type: opening.account_type,
            period_start,
            period_end,
            currency,
            opening_balance: opening.balance,
            lines,
            total_debit,
            total_credit,
            closing_balance: running,
        }
    }
}

/// Accounts of one type, skipping inactive accounts without a balance.
fn section(balances: &[AccountBalance], account_type: AccountType) -> StatementSection {
    let mut section = StatementSection::default();
    for balance in balances
        .iter()
        .filter(|b| b.account_type == account_type)
        .filter(|b| b.is_active || !b.balance.is_zero())
    {
        section.push(StatementLine::account(balance));
    }
    section
}

/// Revenue minus expenses.
fn earnings(balances: &[AccountBalance]) -> Decimal {
    balances
        .iter()
        .map(|b| match b.account_type {
            AccountType::Revenue => b.balance,
            AccountType::Expense => -b.balance,
            _ => Decimal::ZERO,
        })
        .sum()
}
