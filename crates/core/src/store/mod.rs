//! Persistence seam for the ledger.
//!
//! A [`LedgerStore`] hands out tenant-bound units of work:
//!
//! - a [`LedgerRead`] sees one consistent snapshot of a tenant's ledger,
//! - a [`LedgerWrite`] is atomic: nothing it does is visible to anyone
//!   until [`LedgerWrite::commit`], and dropping it discards everything.
//!
//! Writers of the same tenant may run concurrently. Stores must keep entry
//! numbers unique per tenant and report a lost race on a number as
//! [`StoreError::Conflict`] from [`LedgerWrite::mark_posted`], leaving the
//! writer usable so the engine can retry with a fresh number.
//!
//! Implemented by [`memory::InMemoryLedgerStore`] here and by the db crate
//! for PostgreSQL.

pub mod memory;

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tally_shared::TenantContext;
use tally_shared::types::{
    AccountId, ActorId, CostCenterId, JournalEntryId, PageRequest, PageResponse,
};
use thiserror::Error;

use crate::chart::types::{Account, CostCenter};
use crate::ledger::entry::{JournalEntry, JournalEntryLine};
use crate::ledger::types::{EntryStatus, SourceType};

pub use memory::InMemoryLedgerStore;

/// Errors reported by store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Row to update does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Uniqueness constraint violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure (connection, timeout, serialization).
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Inclusive date range; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First included date.
    pub from: Option<NaiveDate>,
    /// Last included date.
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Everything.
    #[must_use]
    pub const fn all() -> Self {
        Self { from: None, to: None }
    }

    /// Everything up to and including `date`.
    #[must_use]
    pub const fn up_to(date: NaiveDate) -> Self {
        Self {
            from: None,
            to: Some(date),
        }
    }

    /// Everything strictly before `date`.
    #[must_use]
    pub fn before(date: NaiveDate) -> Self {
        match date.pred_opt() {
            Some(prev) => Self::up_to(prev),
            // Nothing precedes the minimum date: an empty range.
            None => Self {
                from: Some(NaiveDate::MAX),
                to: Some(NaiveDate::MIN),
            },
        }
    }

    /// `start..=end`.
    #[must_use]
    pub const fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            from: Some(start),
            to: Some(end),
        }
    }

    /// Returns true if `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Base-currency debit and credit sums for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountTotals {
    /// The account.
    pub account_id: AccountId,
    /// Sum of base debits.
    pub debit: Decimal,
    /// Sum of base credits.
    pub credit: Decimal,
}

/// A line of a posted or voided entry, with its entry's header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedLine {
    /// Owning entry.
    pub entry_id: JournalEntryId,
    /// Owning entry's number.
    pub entry_number: i64,
    /// Owning entry's date.
    pub entry_date: NaiveDate,
    /// Owning entry's description.
    pub description: String,
    /// Owning entry's status.
    pub status: EntryStatus,
    /// The line itself.
    pub line: JournalEntryLine,
}

/// Filter for listing entries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Only entries in this status.
    pub status: Option<EntryStatus>,
    /// Only entries dated on or after.
    pub date_from: Option<NaiveDate>,
    /// Only entries dated on or before.
    pub date_to: Option<NaiveDate>,
    /// Only entries with a line on this account.
    pub account_id: Option<AccountId>,
    /// Only entries from this source.
    pub source_type: Option<SourceType>,
    /// Only reversals of this entry.
    pub reversal_of: Option<JournalEntryId>,
}

impl EntryFilter {
    /// Returns true if `entry` passes every set criterion.
    #[must_use]
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.status.is_none_or(|s| entry.status == s)
            && DateRange {
                from: self.date_from,
                to: self.date_to,
            }
            .contains(entry.entry_date)
            && self
                .account_id
                .is_none_or(|a| entry.lines.iter().any(|l| l.account_id == a))
            && self.source_type.is_none_or(|s| entry.source_type == s)
            && self
                .reversal_of
                .is_none_or(|id| entry.reversal_of_entry_id == Some(id))
    }
}

/// Read access to one tenant's ledger, fixed to a single snapshot.
pub trait LedgerRead: Send + Sync {
    /// Fetches an account.
    fn get_account(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// Fetches an account by its code.
    fn find_account_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// Lists accounts ordered by code.
    fn list_accounts(
        &self,
        active_only: bool,
    ) -> impl Future<Output = Result<Vec<Account>, StoreError>> + Send;

    /// Returns true if any journal line, in any status, uses the account.
    fn account_is_referenced(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Fetches a cost center.
    fn get_cost_center(
        &self,
        id: CostCenterId,
    ) -> impl Future<Output = Result<Option<CostCenter>, StoreError>> + Send;

    /// Fetches a cost center by its code.
    fn find_cost_center_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<CostCenter>, StoreError>> + Send;

    /// Lists cost centers ordered by code.
    fn list_cost_centers(&self) -> impl Future<Output = Result<Vec<CostCenter>, StoreError>> + Send;

    /// Fetches an entry with its lines.
    fn get_entry(
        &self,
        id: JournalEntryId,
    ) -> impl Future<Output = Result<Option<JournalEntry>, StoreError>> + Send;

    /// Lists entries with their lines, ordered by date then number.
    fn list_entries(
        &self,
        filter: &EntryFilter,
        page: &PageRequest,
    ) -> impl Future<Output = Result<PageResponse<JournalEntry>, StoreError>> + Send;

    /// Sums base debits and credits of POSTED and VOID lines dated within
    /// `range`, per account. Accounts without such lines are omitted.
    fn account_totals(
        &self,
        range: DateRange,
        account_id: Option<AccountId>,
    ) -> impl Future<Output = Result<Vec<AccountTotals>, StoreError>> + Send;

    /// POSTED and VOID lines of one account dated within `range`, ordered by
    /// date, entry number and line number.
    fn posted_lines(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<PostedLine>, StoreError>> + Send;
}

/// Atomic unit of work on one tenant's ledger.
pub trait LedgerWrite: LedgerRead {
    /// Inserts an account. [`StoreError::Conflict`] if the code is taken.
    fn insert_account(
        &mut self,
        account: &Account,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites an account's mutable fields.
    /// [`StoreError::Conflict`] if a changed code is taken.
    fn update_account(
        &mut self,
        account: &Account,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes an account.
    fn delete_account(
        &mut self,
        id: AccountId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Inserts a cost center. [`StoreError::Conflict`] if the code is taken.
    fn insert_cost_center(
        &mut self,
        cost_center: &CostCenter,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetches an entry and holds it against concurrent writers until this
    /// unit of work ends.
    fn lock_entry(
        &mut self,
        id: JournalEntryId,
    ) -> impl Future<Output = Result<Option<JournalEntry>, StoreError>> + Send;

    /// Inserts an entry header and all of its lines.
    fn insert_entry(
        &mut self,
        entry: &JournalEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces header fields and lines of a draft.
    fn replace_draft(
        &mut self,
        entry: &JournalEntry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a draft and its lines.
    fn delete_draft(
        &mut self,
        id: JournalEntryId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Draws the next entry number from the tenant's sequence. Numbers drawn
    /// by units of work that do not commit may be lost.
    fn next_entry_number(&mut self) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Sets an entry POSTED under `entry_number`.
    /// [`StoreError::Conflict`] if the number is already used, in which
    /// case nothing changes.
    fn mark_posted(
        &mut self,
        id: JournalEntryId,
        entry_number: i64,
        posted_at: DateTime<Utc>,
        posted_by: ActorId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Sets an entry VOID with its audit fields.
    fn mark_void(
        &mut self,
        id: JournalEntryId,
        voided_at: DateTime<Utc>,
        voided_by: ActorId,
        reason: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Makes every change visible at once.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Source of tenant-scoped units of work.
pub trait LedgerStore: Send + Sync + 'static {
    /// Snapshot reader type.
    type Reader: LedgerRead;
    /// Unit-of-work writer type.
    type Writer: LedgerWrite;

    /// Opens a consistent read snapshot of the tenant's ledger.
    fn reader(
        &self,
        tenant: &TenantContext,
    ) -> impl Future<Output = Result<Self::Reader, StoreError>> + Send;

    /// Opens a unit of work on the tenant's ledger.
    fn writer(
        &self,
        tenant: &TenantContext,
    ) -> impl Future<Output = Result<Self::Writer, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_contains() {
        let range = DateRange::between(date(2024, 1, 1), date(2024, 1, 31));
        assert!(range.contains(date(2024, 1, 1)));
        assert!(range.contains(date(2024, 1, 31)));
        assert!(!range.contains(date(2024, 2, 1)));
        assert!(!range.contains(date(2023, 12, 31)));

        assert!(DateRange::all().contains(date(1900, 1, 1)));
        assert!(DateRange::up_to(date(2024, 1, 1)).contains(date(2024, 1, 1)));
    }

    #[test]
    fn test_before_excludes_the_date() {
        let range = DateRange::before(date(2024, 1, 1));
        assert!(range.contains(date(2023, 12, 31)));
        assert!(!range.contains(date(2024, 1, 1)));
        assert!(!DateRange::before(NaiveDate::MIN).contains(NaiveDate::MIN));
    }
}
