//! Account balance calculations.
//!
//! Balances are derived on demand from POSTED and VOID lines in base
//! currency; nothing is cached. A voided entry keeps contributing and is
//! cancelled by its posted reversal.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::TenantContext;
use tally_shared::types::AccountId;
use tracing::instrument;

use super::error::LedgerError;
use crate::chart::types::{Account, AccountType};
use crate::store::{DateRange, LedgerRead, LedgerStore};

/// Side on which an account's balance is positive.
///
/// - Asset/Expense: balance = debit - credit (debit-normal)
/// - Liability/Equity/Revenue: balance = credit - debit (credit-normal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalBalance {
    /// Debit-normal accounts.
    Debit,
    /// Credit-normal accounts.
    Credit,
}

impl NormalBalance {
    /// Signed balance for the given totals.
    #[must_use]
    pub fn signed(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// Balance of one account over a date range, in base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Whether the account is active.
    pub is_active: bool,
    /// Total base debits.
    pub total_debit: Decimal,
    /// Total base credits.
    pub total_credit: Decimal,
    /// Signed by the account's normal balance.
    pub balance: Decimal,
}

impl AccountBalance {
    /// Builds a balance from raw totals.
    #[must_use]
    pub fn from_totals(account: &Account, total_debit: Decimal, total_credit: Decimal) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            is_active: account.is_active,
            total_debit,
            total_credit,
            balance: account
                .account_type
                .normal_balance()
                .signed(total_debit, total_credit),
        }
    }

    /// Debit-positive net, regardless of normal side.
    #[must_use]
    pub fn net_debit(&self) -> Decimal {
        self.total_debit - self.total_credit
    }
}

/// Balance of a single account within `range`, read from `reader`.
pub(crate) async fn balance_in<R: LedgerRead>(
    reader: &R,
    account_id: AccountId,
    range: DateRange,
) -> Result<AccountBalance, LedgerError> {
    let account = reader
        .get_account(account_id)
        .await?
        .ok_or(LedgerError::AccountNotFound(account_id))?;
    let totals = reader.account_totals(range, Some(account_id)).await?;
    let (debit, credit) = totals
        .first()
        .map_or((Decimal::ZERO, Decimal::ZERO), |t| (t.debit, t.credit));
    Ok(AccountBalance::from_totals(&account, debit, credit))
}

/// Balances of every account (active or not) within `range`, ordered by code.
pub(crate) async fn balances_in<R: LedgerRead>(
    reader: &R,
    range: DateRange,
) -> Result<Vec<AccountBalance>, LedgerError> {
    let accounts = reader.list_accounts(false).await?;
    let totals: HashMap<_, _> = reader
        .account_totals(range, None)
        .await?
        .into_iter()
        .map(|t| (t.account_id, (t.debit, t.credit)))
        .collect();

    Ok(accounts
        .iter()
        .map(|account| {
            let (debit, credit) = totals
                .get(&account.id)
                .copied()
                .unwrap_or((Decimal::ZERO, Decimal::ZERO));
            AccountBalance::from_totals(account, debit, credit)
        })
        .collect())
}

/// Checks `start <= end`.
pub(crate) fn ensure_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, LedgerError> {
    if start > end {
        return Err(LedgerError::InvalidDateRange { start, end });
    }
    Ok(DateRange::between(start, end))
}

/// Computes account balances from the ledger.
pub struct BalanceCalculator<S> {
    store: Arc<S>,
}

impl<S> Clone for BalanceCalculator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> BalanceCalculator<S> {
    /// Creates a calculator over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Balance of an account from the beginning of time through `as_of`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if the account does not exist for
    /// the tenant.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn account_balance(
        &self,
        tenant: &TenantContext,
        account_id: AccountId,
        as_of: NaiveDate,
    ) -> Result<AccountBalance, LedgerError> {
        let reader = self.store.reader(tenant).await?;
        balance_in(&reader, account_id, DateRange::up_to(as_of)).await
    }

    /// Movement on an account between `start` and `end` inclusive.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidDateRange`] if `start > end`, or
    /// [`LedgerError::AccountNotFound`].
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn period_activity(
        &self,
        tenant: &TenantContext,
        account_id: AccountId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AccountBalance, LedgerError> {
        let range = ensure_range(start, end)?;
        let reader = self.store.reader(tenant).await?;
        balance_in(&reader, account_id, range).await
    }

    /// Balances of every account through `as_of`, ordered by code.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn all_balances(
        &self,
        tenant: &TenantContext,
        as_of: NaiveDate,
    ) -> Result<Vec<AccountBalance>, LedgerError> {
        let reader = self.store.reader(tenant).await?;
        balances_in(&reader, DateRange::up_to(as_of)).await
    }
}
