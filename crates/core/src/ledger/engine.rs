//! Posting engine: the journal entry lifecycle.
//!
//! `Draft -> Posted -> Void`. Drafts may be edited or discarded; posting
//! assigns the tenant's next entry number; voiding creates and posts a
//! mirror-image reversal in the same unit of work.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_shared::TenantContext;
use tally_shared::types::{
    AccountId, ActorId, CostCenterId, JournalEntryId, PageRequest, PageResponse,
};
use tracing::{debug, info, instrument, warn};

use super::entry::{JournalEntry, NewJournalEntry};
use super::error::LedgerError;
use super::reversal::ReversalService;
use super::types::EntryStatus;
use super::validation::validate_lines;
use crate::store::{EntryFilter, LedgerRead, LedgerStore, LedgerWrite, StoreError};

/// Attempts at drawing an unused entry number before giving up.
const NUMBER_ATTEMPTS: u32 = 2;

/// Drives journal entries through their lifecycle.
pub struct PostingEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for PostingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> PostingEngine<S> {
    /// Creates an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validates and stores a new DRAFT entry. No number is assigned.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientLines`], [`LedgerError::MalformedLine`]
    ///   or [`LedgerError::UnbalancedEntry`] for structurally invalid lines
    /// - [`LedgerError::InvalidAccount`] if an account is missing or inactive
    /// - [`LedgerError::InvalidCostCenter`] if a cost center is missing
    #[instrument(skip(self, tenant, input), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn create_entry(
        &self,
        tenant: &TenantContext,
        actor: ActorId,
        input: NewJournalEntry,
    ) -> Result<JournalEntry, LedgerError> {
        validate_lines(&input.lines, tenant.base_currency()).inspect_err(rejected)?;

        let mut writer = self.store.writer(tenant).await?;
        check_references(&writer, &input).await.inspect_err(rejected)?;

        let entry = JournalEntry::draft(tenant.tenant_id(), actor, input, Utc::now());
        writer.insert_entry(&entry).await?;
        writer.commit().await?;

        info!(entry_id = %entry.id, lines = entry.lines.len(), "Journal entry drafted");
        Ok(entry)
    }

    /// Replaces the header and lines of a DRAFT entry.
    ///
    /// # Errors
    ///
    /// Same validation as [`Self::create_entry`], plus
    /// [`LedgerError::EntryNotFound`] and [`LedgerError::EntryImmutable`].
    #[instrument(skip(self, tenant, input), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn update_draft(
        &self,
        tenant: &TenantContext,
        entry_id: JournalEntryId,
        input: NewJournalEntry,
    ) -> Result<JournalEntry, LedgerError> {
        validate_lines(&input.lines, tenant.base_currency()).inspect_err(rejected)?;

        let mut writer = self.store.writer(tenant).await?;
        let mut entry = load_for_update(&mut writer, entry_id).await?;
        entry.ensure_editable()?;
        check_references(&writer, &input).await.inspect_err(rejected)?;

        entry.apply_update(input);
        writer.replace_draft(&entry).await?;
        writer.commit().await?;

        info!(entry_id = %entry.id, "Draft journal entry updated");
        Ok(entry)
    }

    /// Deletes a DRAFT entry without trace.
    ///
    /// # Errors
    ///
    /// [`LedgerError::EntryNotFound`], or [`LedgerError::EntryImmutable`]
    /// for POSTED and VOID entries.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn discard_draft(
        &self,
        tenant: &TenantContext,
        entry_id: JournalEntryId,
    ) -> Result<(), LedgerError> {
        let mut writer = self.store.writer(tenant).await?;
        let entry = load_for_update(&mut writer, entry_id).await?;
        entry.ensure_editable()?;

        writer.delete_draft(entry_id).await?;
        writer.commit().await?;

        info!(entry_id = %entry_id, "Draft journal entry discarded");
        Ok(())
    }

    /// Moves a DRAFT entry to POSTED and assigns its entry number.
    ///
    /// Lines are re-validated first, so a draft that drifted out of balance
    /// can never be posted.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EntryNotFound`]
    /// - [`LedgerError::InvalidStateTransition`] unless the entry is DRAFT
    /// - any validation error of [`Self::create_entry`]
    /// - [`LedgerError::NumberAssignmentConflict`] if concurrent posts kept
    ///   taking the drawn number
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn post_entry(
        &self,
        tenant: &TenantContext,
        entry_id: JournalEntryId,
        actor: ActorId,
    ) -> Result<JournalEntry, LedgerError> {
        let mut writer = self.store.writer(tenant).await?;
        let mut entry = load_for_update(&mut writer, entry_id).await?;
        entry.ensure_can_transition(EntryStatus::Posted)?;
        validate_lines(&entry.lines, tenant.base_currency()).inspect_err(rejected)?;
        check_entry_references(&writer, &entry)
            .await
            .inspect_err(rejected)?;

        post_in(&mut writer, &mut entry, actor, Utc::now()).await?;
        writer.commit().await?;

        info!(
            entry_id = %entry.id,
            entry_number = entry.entry_number,
            "Journal entry posted"
        );
        Ok(entry)
    }

    /// Creates and posts an entry in one unit of work.
    ///
    /// # Errors
    ///
    /// Union of [`Self::create_entry`] and [`Self::post_entry`] errors.
    #[instrument(skip(self, tenant, input), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn create_and_post(
        &self,
        tenant: &TenantContext,
        actor: ActorId,
        input: NewJournalEntry,
    ) -> Result<JournalEntry, LedgerError> {
        validate_lines(&input.lines, tenant.base_currency()).inspect_err(rejected)?;

        let mut writer = self.store.writer(tenant).await?;
        check_references(&writer, &input).await.inspect_err(rejected)?;

        let now = Utc::now();
        let mut entry = JournalEntry::draft(tenant.tenant_id(), actor, input, now);
        writer.insert_entry(&entry).await?;
        post_in(&mut writer, &mut entry, actor, now).await?;
        writer.commit().await?;

        info!(
            entry_id = %entry.id,
            entry_number = entry.entry_number,
            "Journal entry created and posted"
        );
        Ok(entry)
    }

    /// Voids a POSTED entry and returns its posted reversal.
    ///
    /// The reversal mirrors every line, is born POSTED with its own number,
    /// and is committed together with the status change of the original.
    /// Reversals can themselves be voided.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::VoidReasonRequired`] for a blank reason
    /// - [`LedgerError::EntryNotFound`]
    /// - [`LedgerError::AlreadyVoided`] if the entry is VOID
    /// - [`LedgerError::InvalidStateTransition`] if the entry is DRAFT
    /// - [`LedgerError::NumberAssignmentConflict`]
    #[instrument(skip(self, tenant, reason), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn void_entry(
        &self,
        tenant: &TenantContext,
        entry_id: JournalEntryId,
        actor: ActorId,
        reason: &str,
    ) -> Result<JournalEntry, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::VoidReasonRequired);
        }

        let mut writer = self.store.writer(tenant).await?;
        let original = load_for_update(&mut writer, entry_id).await?;
        original.ensure_can_transition(EntryStatus::Void)?;

        let now = Utc::now();
        let mut reversal = ReversalService::reverse(&original, actor, reason, now);
        writer.insert_entry(&reversal).await?;
        post_in(&mut writer, &mut reversal, actor, now).await?;
        writer.mark_void(original.id, now, actor, reason).await?;
        writer.commit().await?;

        info!(
            entry_id = %original.id,
            reversal_id = %reversal.id,
            reversal_number = reversal.entry_number,
            "Journal entry voided"
        );
        Ok(reversal)
    }

    /// Fetches an entry with its lines.
    ///
    /// # Errors
    ///
    /// [`LedgerError::EntryNotFound`] if the tenant has no such entry.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn get_entry(
        &self,
        tenant: &TenantContext,
        entry_id: JournalEntryId,
    ) -> Result<JournalEntry, LedgerError> {
        self.store
            .reader(tenant)
            .await?
            .get_entry(entry_id)
            .await?
            .ok_or(LedgerError::EntryNotFound(entry_id))
    }

    /// Lists entries matching `filter`, ordered by date then number.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn list_entries(
        &self,
        tenant: &TenantContext,
        filter: &EntryFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<JournalEntry>, LedgerError> {
        let reader = self.store.reader(tenant).await?;
        Ok(reader.list_entries(filter, page).await?)
    }
}

fn rejected(err: &LedgerError) {
    debug!(error = %err, "Journal entry rejected");
}

async fn load_for_update<W: LedgerWrite>(
    writer: &mut W,
    entry_id: JournalEntryId,
) -> Result<JournalEntry, LedgerError> {
    writer
        .lock_entry(entry_id)
        .await?
        .ok_or(LedgerError::EntryNotFound(entry_id))
}

/// Draws a number and marks the entry POSTED, retrying once if the number
/// was taken by a concurrent post.
async fn post_in<W: LedgerWrite>(
    writer: &mut W,
    entry: &mut JournalEntry,
    actor: ActorId,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    for attempt in 1..=NUMBER_ATTEMPTS {
        let number = writer.next_entry_number().await?;
        match writer.mark_posted(entry.id, number, now, actor).await {
            Ok(()) => {
                entry.status = EntryStatus::Posted;
                entry.entry_number = Some(number);
                entry.posted_at = Some(now);
                entry.posted_by = Some(actor);
                return Ok(());
            }
            Err(StoreError::Conflict(detail)) => {
                warn!(
                    entry_id = %entry.id,
                    entry_number = number,
                    attempt,
                    detail = %detail,
                    "Entry number already taken"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(LedgerError::NumberAssignmentConflict { entry_id: entry.id })
}

async fn check_references<R: LedgerRead>(
    reader: &R,
    input: &NewJournalEntry,
) -> Result<(), LedgerError> {
    let accounts = input.lines.iter().map(|l| l.account_id).collect();
    let cost_centers = input.lines.iter().filter_map(|l| l.cost_center_id).collect();
    check_ids(reader, accounts, cost_centers).await
}

async fn check_entry_references<R: LedgerRead>(
    reader: &R,
    entry: &JournalEntry,
) -> Result<(), LedgerError> {
    let accounts = entry.lines.iter().map(|l| l.account_id).collect();
    let cost_centers = entry.lines.iter().filter_map(|l| l.cost_center_id).collect();
    check_ids(reader, accounts, cost_centers).await
}

/// Every account must exist and be active; every cost center must exist.
async fn check_ids<R: LedgerRead>(
    reader: &R,
    accounts: BTreeSet<AccountId>,
    cost_centers: BTreeSet<CostCenterId>,
) -> Result<(), LedgerError> {
    for account_id in accounts {
        match reader.get_account(account_id).await? {
            None => {
                return Err(LedgerError::InvalidAccount {
                    account_id,
                    reason: "account does not exist",
                });
            }
            Some(account) if !account.is_active => {
                return Err(LedgerError::InvalidAccount {
                    account_id,
                    reason: "account is inactive",
                });
            }
            Some(_) => {}
        }
    }

    for cost_center_id in cost_centers {
        if reader.get_cost_center(cost_center_id).await?.is_none() {
            return Err(LedgerError::InvalidCostCenter(cost_center_id));
        }
    }

    Ok(())
}
