//! In-memory [`LedgerStore`].
//!
//! Each tenant's ledger is an immutable snapshot behind an `Arc`. Readers
//! clone the `Arc`; a writer takes the tenant's write lock, edits a private
//! copy and swaps it in on commit. Writers of one tenant therefore run one
//! at a time, while readers and other tenants are never blocked.
//!
//! The lock covers the whole unit of work, so within one tenant draft
//! creation and post-time validation queue behind each other as well as
//! number assignment. The PostgreSQL store only serializes on the sequence
//! row. This one is meant for tests and single-node embedding where that
//! contention does not matter.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tally_shared::TenantContext;
use tally_shared::types::{
    AccountId, ActorId, CostCenterId, JournalEntryId, PageRequest, PageResponse, TenantId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    AccountTotals, DateRange, EntryFilter, LedgerRead, LedgerStore, LedgerWrite, PostedLine,
    StoreError,
};
use crate::chart::types::{Account, CostCenter};
use crate::ledger::entry::JournalEntry;
use crate::ledger::types::EntryStatus;

/// One tenant's complete ledger.
#[derive(Debug, Clone, Default)]
struct TenantLedger {
    accounts: BTreeMap<AccountId, Account>,
    cost_centers: BTreeMap<CostCenterId, CostCenter>,
    entries: BTreeMap<JournalEntryId, JournalEntry>,
    numbers: BTreeSet<i64>,
    /// Last number drawn.
    sequence: i64,
}

impl TenantLedger {
    fn account(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).cloned()
    }

    fn account_by_code(&self, code: &str) -> Option<Account> {
        self.accounts.values().find(|a| a.code == code).cloned()
    }

    fn accounts(&self, active_only: bool) -> Vec<Account> {
        let mut accounts: Vec<_> = self
            .accounts
            .values()
            .filter(|a| !active_only || a.is_active)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        accounts
    }

    fn is_referenced(&self, id: AccountId) -> bool {
        self.entries
            .values()
            .flat_map(|e| &e.lines)
            .any(|l| l.account_id == id)
    }

    fn cost_center_by_code(&self, code: &str) -> Option<CostCenter> {
        self.cost_centers.values().find(|c| c.code == code).cloned()
    }

    fn cost_centers(&self) -> Vec<CostCenter> {
        let mut centers: Vec<_> = self.cost_centers.values().cloned().collect();
        centers.sort_by(|a, b| a.code.cmp(&b.code));
        centers
    }

    fn entries(&self, filter: &EntryFilter, page: &PageRequest) -> PageResponse<JournalEntry> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| {
            (
                e.entry_date,
                e.entry_number.unwrap_or(i64::MAX),
                e.created_at,
                e.id,
            )
        });
        PageResponse::from_all(entries, page)
    }

    fn booked(&self, range: DateRange) -> impl Iterator<Item = &JournalEntry> {
        self.entries
            .values()
            .filter(move |e| e.status.contributes_to_balances() && range.contains(e.entry_date))
    }

    fn totals(&self, range: DateRange, account_id: Option<AccountId>) -> Vec<AccountTotals> {
        let mut totals: BTreeMap<AccountId, AccountTotals> = BTreeMap::new();
        for line in self.booked(range).flat_map(|e| &e.lines) {
            if account_id.is_some_and(|id| id != line.account_id) {
                continue;
            }
            let entry = totals.entry(line.account_id).or_insert(AccountTotals {
                account_id: line.account_id,
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
            });
            entry.debit += line.base_debit;
            entry.credit += line.base_credit;
        }
        totals.into_values().collect()
    }

    fn posted_lines(&self, account_id: AccountId, range: DateRange) -> Vec<PostedLine> {
        let mut lines: Vec<_> = self
            .booked(range)
            .flat_map(|entry| {
                entry
                    .lines
                    .iter()
                    .filter(move |l| l.account_id == account_id)
                    .map(move |line| PostedLine {
                        entry_id: entry.id,
                        entry_number: entry.entry_number.unwrap_or_default(),
                        entry_date: entry.entry_date,
                        description: entry.description.clone(),
                        status: entry.status,
                        line: line.clone(),
                    })
            })
            .collect();
        lines.sort_by_key(|p| (p.entry_date, p.entry_number, p.line.line_number));
        lines
    }

    fn entry_mut(&mut self, id: JournalEntryId) -> Result<&mut JournalEntry, StoreError> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("journal entry {id}")))
    }
}

/// In-process store for tests, demos and single-node embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    snapshots: Arc<DashMap<TenantId, Arc<TenantLedger>>>,
    write_locks: Arc<DashMap<TenantId, Arc<Mutex<()>>>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail with [`StoreError::Backend`],
    /// discarding the unit of work, until switched off again.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Resets a tenant's number sequence so the next number drawn is
    /// `last + 1`, even if that number is already used.
    pub async fn rewind_sequence(&self, tenant_id: TenantId, last: i64) {
        let lock = self.write_lock(tenant_id);
        let _guard = lock.lock().await;
        let mut ledger = self.snapshot(tenant_id).as_ref().clone();
        ledger.sequence = last;
        self.snapshots.insert(tenant_id, Arc::new(ledger));
    }

    fn snapshot(&self, tenant_id: TenantId) -> Arc<TenantLedger> {
        self.snapshots
            .get(&tenant_id)
            .map(|s| Arc::clone(s.value()))
            .unwrap_or_default()
    }

    fn write_lock(&self, tenant_id: TenantId) -> Arc<Mutex<()>> {
        Arc::clone(self.write_locks.entry(tenant_id).or_default().value())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    async fn reader(&self, tenant: &TenantContext) -> Result<MemoryReader, StoreError> {
        Ok(MemoryReader {
            ledger: self.snapshot(tenant.tenant_id()),
        })
    }

    async fn writer(&self, tenant: &TenantContext) -> Result<MemoryWriter, StoreError> {
        let tenant_id = tenant.tenant_id();
        let guard = self.write_lock(tenant_id).lock_owned().await;
        Ok(MemoryWriter {
            tenant_id,
            working: self.snapshot(tenant_id).as_ref().clone(),
            snapshots: Arc::clone(&self.snapshots),
            fail_commits: Arc::clone(&self.fail_commits),
            _guard: guard,
        })
    }
}

/// Read snapshot of one tenant.
#[derive(Debug)]
pub struct MemoryReader {
    ledger: Arc<TenantLedger>,
}

/// Unit of work on one tenant. Holds the tenant's write lock until dropped.
#[derive(Debug)]
pub struct MemoryWriter {
    tenant_id: TenantId,
    working: TenantLedger,
    snapshots: Arc<DashMap<TenantId, Arc<TenantLedger>>>,
    fail_commits: Arc<AtomicBool>,
    _guard: OwnedMutexGuard<()>,
}

macro_rules! impl_ledger_read {
    ($ty:ty, $field:ident) => {
        impl LedgerRead for $ty {
            async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
                Ok(self.$field.account(id))
            }

            async fn find_account_by_code(
                &self,
                code: &str,
            ) -> Result<Option<Account>, StoreError> {
                Ok(self.$field.account_by_code(code))
            }

            async fn list_accounts(&self, active_only: bool) -> Result<Vec<Account>, StoreError> {
                Ok(self.$field.accounts(active_only))
            }

            async fn account_is_referenced(&self, id: AccountId) -> Result<bool, StoreError> {
                Ok(self.$field.is_referenced(id))
            }

            async fn get_cost_center(
                &self,
                id: CostCenterId,
            ) -> Result<Option<CostCenter>, StoreError> {
                Ok(self.$field.cost_centers.get(&id).cloned())
            }

            async fn find_cost_center_by_code(
                &self,
                code: &str,
            ) -> Result<Option<CostCenter>, StoreError> {
                Ok(self.$field.cost_center_by_code(code))
            }

            async fn list_cost_centers(&self) -> Result<Vec<CostCenter>, StoreError> {
                Ok(self.$field.cost_centers())
            }

            async fn get_entry(
                &self,
                id: JournalEntryId,
            ) -> Result<Option<JournalEntry>, StoreError> {
                Ok(self.$field.entries.get(&id).cloned())
            }

            async fn list_entries(
                &self,
                filter: &EntryFilter,
                page: &PageRequest,
            ) -> Result<PageResponse<JournalEntry>, StoreError> {
                Ok(self.$field.entries(filter, page))
            }

            async fn account_totals(
                &self,
                range: DateRange,
                account_id: Option<AccountId>,
            ) -> Result<Vec<AccountTotals>, StoreError> {
                Ok(self.$field.totals(range, account_id))
            }

            async fn posted_lines(
                &self,
                account_id: AccountId,
                range: DateRange,
            ) -> Result<Vec<PostedLine>, StoreError> {
                Ok(self.$field.posted_lines(account_id, range))
            }
        }
    };
}

impl_ledger_read!(MemoryReader, ledger);
impl_ledger_read!(MemoryWriter, working);

impl LedgerWrite for MemoryWriter {
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self.working.account_by_code(&account.code).is_some() {
            return Err(StoreError::Conflict(format!(
                "account code '{}'",
                account.code
            )));
        }
        self.working.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self
            .working
            .account_by_code(&account.code)
            .is_some_and(|other| other.id != account.id)
        {
            return Err(StoreError::Conflict(format!(
                "account code '{}'",
                account.code
            )));
        }
        let slot = self
            .working
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account.id)))?;
        *slot = account.clone();
        Ok(())
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), StoreError> {
        self.working
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))
    }

    async fn insert_cost_center(&mut self, cost_center: &CostCenter) -> Result<(), StoreError> {
        if self.working.cost_center_by_code(&cost_center.code).is_some() {
            return Err(StoreError::Conflict(format!(
                "cost center code '{}'",
                cost_center.code
            )));
        }
        self.working
            .cost_centers
            .insert(cost_center.id, cost_center.clone());
        Ok(())
    }

    async fn lock_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        // The tenant write lock already excludes other writers.
        Ok(self.working.entries.get(&id).cloned())
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        if self.working.entries.contains_key(&entry.id) {
            return Err(StoreError::Conflict(format!("journal entry {}", entry.id)));
        }
        if let Some(number) = entry.entry_number {
            if !self.working.numbers.insert(number) {
                return Err(StoreError::Conflict(format!("entry number {number}")));
            }
        }
        self.working.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn replace_draft(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        let slot = self.working.entry_mut(entry.id)?;
        *slot = entry.clone();
        Ok(())
    }

    async fn delete_draft(&mut self, id: JournalEntryId) -> Result<(), StoreError> {
        self.working
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("journal entry {id}")))
    }

    async fn next_entry_number(&mut self) -> Result<i64, StoreError> {
        self.working.sequence += 1;
        Ok(self.working.sequence)
    }

    async fn mark_posted(
        &mut self,
        id: JournalEntryId,
        entry_number: i64,
        posted_at: DateTime<Utc>,
        posted_by: ActorId,
    ) -> Result<(), StoreError> {
        if self.working.numbers.contains(&entry_number) {
            return Err(StoreError::Conflict(format!("entry number {entry_number}")));
        }
        let entry = self.working.entry_mut(id)?;
        entry.status = EntryStatus::Posted;
        entry.entry_number = Some(entry_number);
        entry.posted_at = Some(posted_at);
        entry.posted_by = Some(posted_by);
        self.working.numbers.insert(entry_number);
        Ok(())
    }

    async fn mark_void(
        &mut self,
        id: JournalEntryId,
        voided_at: DateTime<Utc>,
        voided_by: ActorId,
        reason: &str,
    ) -> Result<(), StoreError> {
        let entry = self.working.entry_mut(id)?;
        entry.status = EntryStatus::Void;
        entry.voided_at = Some(voided_at);
        entry.voided_by = Some(voided_by);
        entry.void_reason = Some(reason.to_string());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("commit failed".to_string()));
        }
        self.snapshots
            .insert(self.tenant_id, Arc::new(self.working));
        Ok(())
    }
}
