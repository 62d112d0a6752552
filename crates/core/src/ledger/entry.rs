//! Journal entries and their lines.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{
    AccountId, ActorId, CostCenterId, CurrencyCode, JournalEntryId, JournalLineId, TenantId,
    convert_amount,
};

use super::error::LedgerError;
use super::types::{EntryStatus, EntryTotals, SourceType};

/// Amount view shared by submitted and stored lines, so both go through
/// the same validation.
pub trait LineAmounts {
    /// Transaction-currency debit.
    fn debit_amount(&self) -> Decimal;
    /// Transaction-currency credit.
    fn credit_amount(&self) -> Decimal;
    /// Base-currency debit.
    fn base_debit(&self) -> Decimal;
    /// Base-currency credit.
    fn base_credit(&self) -> Decimal;
    /// Transaction currency.
    fn currency(&self) -> &CurrencyCode;
}

/// A single debit or credit line of a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    /// Unique identifier.
    pub id: JournalLineId,
    /// Owning entry.
    pub journal_entry_id: JournalEntryId,
    /// 1-based position within the entry.
    pub line_number: i32,
    /// Account posted to.
    pub account_id: AccountId,
    /// Debit in the transaction currency.
    pub debit_amount: Decimal,
    /// Credit in the transaction currency.
    pub credit_amount: Decimal,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Debit in the tenant's base currency.
    pub base_debit: Decimal,
    /// Credit in the tenant's base currency.
    pub base_credit: Decimal,
    /// Optional reporting dimension.
    pub cost_center_id: Option<CostCenterId>,
    /// Optional memo.
    pub memo: Option<String>,
}

impl JournalEntryLine {
    /// Net base-currency effect, debit positive.
    #[must_use]
    pub fn signed_base(&self) -> Decimal {
        self.base_debit - self.base_credit
    }

    /// Returns true for a debit line.
    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.debit_amount > Decimal::ZERO
    }
}

impl LineAmounts for JournalEntryLine {
    fn debit_amount(&self) -> Decimal {
        self.debit_amount
    }
    fn credit_amount(&self) -> Decimal {
        self.credit_amount
    }
    fn base_debit(&self) -> Decimal {
        self.base_debit
    }
    fn base_credit(&self) -> Decimal {
        self.base_credit
    }
    fn currency(&self) -> &CurrencyCode {
        &self.currency
    }
}

/// Line input for a new or updated draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJournalLine {
    /// Account posted to.
    pub account_id: AccountId,
    /// Debit in the transaction currency.
    pub debit_amount: Decimal,
    /// Credit in the transaction currency.
    pub credit_amount: Decimal,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Debit in the tenant's base currency.
    pub base_debit: Decimal,
    /// Credit in the tenant's base currency.
    pub base_credit: Decimal,
    /// Optional reporting dimension.
    pub cost_center_id: Option<CostCenterId>,
    /// Optional memo.
    pub memo: Option<String>,
}

impl NewJournalLine {
    /// Debit line where the transaction currency is the base currency.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal, currency: CurrencyCode) -> Self {
        Self::debit_foreign(account_id, amount, currency, amount)
    }

    /// Credit line where the transaction currency is the base currency.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal, currency: CurrencyCode) -> Self {
        Self::credit_foreign(account_id, amount, currency, amount)
    }

    /// Debit line with an explicit base-currency amount.
    #[must_use]
    pub fn debit_foreign(
        account_id: AccountId,
        amount: Decimal,
        currency: CurrencyCode,
        base_amount: Decimal,
    ) -> Self {
        Self {
            account_id,
            debit_amount: amount,
            credit_amount: Decimal::ZERO,
            currency,
            base_debit: base_amount,
            base_credit: Decimal::ZERO,
            cost_center_id: None,
            memo: None,
        }
    }

    /// Credit line with an explicit base-currency amount.
    #[must_use]
    pub fn credit_foreign(
        account_id: AccountId,
        amount: Decimal,
        currency: CurrencyCode,
        base_amount: Decimal,
    ) -> Self {
        Self {
            account_id,
            debit_amount: Decimal::ZERO,
            credit_amount: amount,
            currency,
            base_debit: Decimal::ZERO,
            base_credit: base_amount,
            cost_center_id: None,
            memo: None,
        }
    }

    /// Debit line whose base amount is `amount * rate`, banker's-rounded.
    #[must_use]
    pub fn debit_at_rate(
        account_id: AccountId,
        amount: Decimal,
        currency: CurrencyCode,
        rate: Decimal,
    ) -> Self {
        Self::debit_foreign(account_id, amount, currency, convert_amount(amount, rate))
    }

    /// Credit line whose base amount is `amount * rate`, banker's-rounded.
    #[must_use]
    pub fn credit_at_rate(
        account_id: AccountId,
        amount: Decimal,
        currency: CurrencyCode,
        rate: Decimal,
    ) -> Self {
        Self::credit_foreign(account_id, amount, currency, convert_amount(amount, rate))
    }

    /// Attaches a cost center.
    #[must_use]
    pub fn with_cost_center(mut self, cost_center_id: CostCenterId) -> Self {
        self.cost_center_id = Some(cost_center_id);
        self
    }

    /// Attaches a memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

impl LineAmounts for NewJournalLine {
    fn debit_amount(&self) -> Decimal {
        self.debit_amount
    }
    fn credit_amount(&self) -> Decimal {
        self.credit_amount
    }
    fn base_debit(&self) -> Decimal {
        self.base_debit
    }
    fn base_credit(&self) -> Decimal {
        self.base_credit
    }
    fn currency(&self) -> &CurrencyCode {
        &self.currency
    }
}

/// Header and lines for a new or updated draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJournalEntry {
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// External reference (invoice number, bank ref).
    pub reference: Option<String>,
    /// Originating subsystem.
    pub source_type: SourceType,
    /// Lines, in order.
    pub lines: Vec<NewJournalLine>,
}

impl NewJournalEntry {
    /// Manual entry with no reference.
    #[must_use]
    pub fn manual(
        entry_date: NaiveDate,
        description: impl Into<String>,
        lines: Vec<NewJournalLine>,
    ) -> Self {
        Self {
            entry_date,
            description: description.into(),
            reference: None,
            source_type: SourceType::Manual,
            lines,
        }
    }

    /// Sets the external reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets the source type.
    #[must_use]
    pub const fn with_source(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }
}

/// A journal entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Sequential number, assigned when posted.
    pub entry_number: Option<i64>,
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// External reference.
    pub reference: Option<String>,
    /// Originating subsystem.
    pub source_type: SourceType,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Who created the entry.
    pub created_by: ActorId,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Who posted the entry.
    pub posted_by: Option<ActorId>,
    /// When the entry was voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// Who voided the entry.
    pub voided_by: Option<ActorId>,
    /// Why the entry was voided.
    pub void_reason: Option<String>,
    /// Entry this one reverses, if it is a reversal.
    pub reversal_of_entry_id: Option<JournalEntryId>,
    /// Lines, ordered by line number.
    #[serde(default)]
    pub lines: Vec<JournalEntryLine>,
}

impl JournalEntry {
    /// Builds a new draft from validated input.
    #[must_use]
    pub fn draft(
        tenant_id: TenantId,
        created_by: ActorId,
        input: NewJournalEntry,
        now: DateTime<Utc>,
    ) -> Self {
        let id = JournalEntryId::new();
        let mut entry = Self {
            id,
            tenant_id,
            entry_number: None,
            entry_date: input.entry_date,
            description: input.description,
            reference: input.reference,
            source_type: input.source_type,
            status: EntryStatus::Draft,
            created_by,
            created_at: now,
            posted_at: None,
            posted_by: None,
            voided_at: None,
            voided_by: None,
            void_reason: None,
            reversal_of_entry_id: None,
            lines: Vec::new(),
        };
        entry.lines = build_lines(id, input.lines);
        entry
    }

    /// Replaces header and lines of a draft, keeping identity and audit fields.
    pub fn apply_update(&mut self, input: NewJournalEntry) {
        self.entry_date = input.entry_date;
        self.description = input.description;
        self.reference = input.reference;
        self.source_type = input.source_type;
        self.lines = build_lines(self.id, input.lines);
    }

    /// Sums both currency views of the lines.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        totals_of(&self.lines)
    }

    /// Checks the lifecycle allows moving to `next`.
    pub fn ensure_can_transition(&self, next: EntryStatus) -> Result<(), LedgerError> {
        if self.status == EntryStatus::Void && next == EntryStatus::Void {
            return Err(LedgerError::AlreadyVoided(self.id));
        }
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidStateTransition {
                entry_id: self.id,
                from: self.status,
                to: next,
            });
        }
        Ok(())
    }

    /// Checks header and lines may still be changed.
    pub fn ensure_editable(&self) -> Result<(), LedgerError> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(LedgerError::EntryImmutable {
                entry_id: self.id,
                status: self.status,
            })
        }
    }
}

/// Sums both currency views of any line slice.
pub fn totals_of<L: LineAmounts>(lines: &[L]) -> EntryTotals {
    lines.iter().fold(EntryTotals::default(), |acc, line| EntryTotals {
        debit: acc.debit + line.debit_amount(),
        credit: acc.credit + line.credit_amount(),
        base_debit: acc.base_debit + line.base_debit(),
        base_credit: acc.base_credit + line.base_credit(),
    })
}

fn build_lines(entry_id: JournalEntryId, lines: Vec<NewJournalLine>) -> Vec<JournalEntryLine> {
    lines
        .into_iter()
        .zip(1..)
        .map(|(line, line_number)| JournalEntryLine {
            id: JournalLineId::new(),
            journal_entry_id: entry_id,
            line_number,
            account_id: line.account_id,
            debit_amount: line.debit_amount,
            credit_amount: line.credit_amount,
            currency: line.currency,
            base_debit: line.base_debit,
            base_credit: line.base_credit,
            cost_center_id: line.cost_center_id,
            memo: line.memo,
        })
        .collect()
}
