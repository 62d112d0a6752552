//! Reversing entries for voided journal entries.

use chrono::{DateTime, Utc};
use tally_shared::types::{ActorId, JournalEntryId, JournalLineId};

use super::entry::{JournalEntry, JournalEntryLine};
use super::types::EntryStatus;

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Builds the draft reversal of `original` by swapping debits and credits.
    ///
    /// For each original line:
    /// - debits become credits and credits become debits, in both currencies
    /// - account, currency, cost center and memo are preserved
    ///
    /// The reversal keeps the original's date, reference and source so it
    /// lands in the same period. The caller posts it.
    #[must_use]
    pub fn reverse(
        original: &JournalEntry,
        actor: ActorId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> JournalEntry {
        let id = JournalEntryId::new();
        let number = original
            .entry_number
            .map_or_else(|| original.id.to_string(), |n| n.to_string());

        JournalEntry {
            id,
            tenant_id: original.tenant_id,
            entry_number: None,
            entry_date: original.entry_date,
            description: format!("Reversal of entry #{number}: {reason}"),
            reference: original.reference.clone(),
            source_type: original.source_type,
            status: EntryStatus::Draft,
            created_by: actor,
            created_at: now,
            posted_at: None,
            posted_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            reversal_of_entry_id: Some(original.id),
            lines: original
                .lines
                .iter()
                .map(|line| Self::mirror_line(line, id))
                .collect(),
        }
    }

    fn mirror_line(line: &JournalEntryLine, entry_id: JournalEntryId) -> JournalEntryLine {
        JournalEntryLine {
            id: JournalLineId::new(),
            journal_entry_id: entry_id,
            line_number: line.line_number,
            account_id: line.account_id,
            debit_amount: line.credit_amount,
            credit_amount: line.debit_amount,
            currency: line.currency.clone(),
            base_debit: line.base_credit,
            base_credit: line.base_debit,
            cost_center_id: line.cost_center_id,
            memo: line.memo.clone(),
        }
    }
}
