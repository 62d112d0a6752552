//! Conversions between entity models and ledger types.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{DbErr, Set, SqlErr};
use tally_core::chart::types::{Account, AccountType, CostCenter};
use tally_core::ledger::entry::{JournalEntry, JournalEntryLine};
use tally_core::ledger::types::{EntryStatus, SourceType};
use tally_core::store::StoreError;
use tally_shared::types::{
    AccountId, ActorId, CostCenterId, CurrencyCode, JournalEntryId, JournalLineId, TenantId,
};
use uuid::Uuid;

use crate::entities::{accounts, cost_centers, journal_entries, journal_entry_lines};

/// Unique violations become [`StoreError::Conflict`]; the rest are backend
/// failures.
pub(crate) fn store_err(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Conflict(detail),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn corrupt(table: &str, id: Uuid, field: &str) -> StoreError {
    StoreError::Backend(format!("Corrupt {table} row {id}: bad {field}"))
}

pub(crate) fn utc(ts: DateTime<FixedOffset>) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

pub(crate) fn stamp(ts: DateTime<Utc>) -> DateTime<FixedOffset> {
    ts.into()
}

pub(crate) fn account(row: accounts::Model) -> Result<Account, StoreError> {
    let account_type =
        AccountType::parse(&row.account_type).map_err(|_| corrupt("accounts", row.id, "type"))?;
    Ok(Account {
        id: AccountId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        code: row.code,
        name: row.name,
        account_type,
        is_system: row.is_system,
        is_active: row.is_active,
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
    })
}

pub(crate) fn account_model(account: &Account) -> accounts::ActiveModel {
    accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        tenant_id: Set(account.tenant_id.into_inner()),
        code: Set(account.code.clone()),
        name: Set(account.name.clone()),
        account_type: Set(account.account_type.as_str().to_string()),
        is_system: Set(account.is_system),
        is_active: Set(account.is_active),
        created_at: Set(stamp(account.created_at)),
        updated_at: Set(stamp(account.updated_at)),
    }
}

pub(crate) fn cost_center(row: cost_centers::Model) -> CostCenter {
    CostCenter {
        id: CostCenterId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        code: row.code,
        name: row.name,
        created_at: utc(row.created_at),
    }
}

pub(crate) fn cost_center_model(cost_center: &CostCenter) -> cost_centers::ActiveModel {
    cost_centers::ActiveModel {
        id: Set(cost_center.id.into_inner()),
        tenant_id: Set(cost_center.tenant_id.into_inner()),
        code: Set(cost_center.code.clone()),
        name: Set(cost_center.name.clone()),
        created_at: Set(stamp(cost_center.created_at)),
    }
}

pub(crate) fn line(row: journal_entry_lines::Model) -> Result<JournalEntryLine, StoreError> {
    let currency = CurrencyCode::parse(row.currency.trim())
        .map_err(|_| corrupt("journal_entry_lines", row.id, "currency"))?;
    Ok(JournalEntryLine {
        id: JournalLineId::from_uuid(row.id),
        journal_entry_id: JournalEntryId::from_uuid(row.journal_entry_id),
        line_number: row.line_number,
        account_id: AccountId::from_uuid(row.account_id),
        debit_amount: row.debit_amount,
        credit_amount: row.credit_amount,
        currency,
        base_debit: row.base_debit,
        base_credit: row.base_credit,
        cost_center_id: row.cost_center_id.map(CostCenterId::from_uuid),
        memo: row.memo,
    })
}

pub(crate) fn line_model(
    tenant_id: TenantId,
    line: &JournalEntryLine,
) -> journal_entry_lines::ActiveModel {
    journal_entry_lines::ActiveModel {
        id: Set(line.id.into_inner()),
        tenant_id: Set(tenant_id.into_inner()),
        journal_entry_id: Set(line.journal_entry_id.into_inner()),
        line_number: Set(line.line_number),
        account_id: Set(line.account_id.into_inner()),
        debit_amount: Set(line.debit_amount),
        credit_amount: Set(line.credit_amount),
        currency: Set(line.currency.as_str().to_string()),
        base_debit: Set(line.base_debit),
        base_credit: Set(line.base_credit),
        cost_center_id: Set(line.cost_center_id.map(CostCenterId::into_inner)),
        memo: Set(line.memo.clone()),
    }
}

pub(crate) fn entry_status(id: Uuid, status: &str) -> Result<EntryStatus, StoreError> {
    EntryStatus::parse(status).ok_or_else(|| corrupt("journal_entries", id, "status"))
}

pub(crate) fn entry(
    row: journal_entries::Model,
    lines: Vec<JournalEntryLine>,
) -> Result<JournalEntry, StoreError> {
    let status = entry_status(row.id, &row.status)?;
    let source_type = SourceType::parse(&row.source_type)
        .ok_or_else(|| corrupt("journal_entries", row.id, "source type"))?;
    Ok(JournalEntry {
        id: JournalEntryId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        entry_number: row.entry_number,
        entry_date: row.entry_date,
        description: row.description,
        reference: row.reference,
        source_type,
        status,
        created_by: ActorId::from_uuid(row.created_by),
        created_at: utc(row.created_at),
        posted_at: row.posted_at.map(utc),
        posted_by: row.posted_by.map(ActorId::from_uuid),
        voided_at: row.voided_at.map(utc),
        voided_by: row.voided_by.map(ActorId::from_uuid),
        void_reason: row.void_reason,
        reversal_of_entry_id: row.reversal_of_entry_id.map(JournalEntryId::from_uuid),
        lines,
    })
}

pub(crate) fn entry_model(entry: &JournalEntry) -> journal_entries::ActiveModel {
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        tenant_id: Set(entry.tenant_id.into_inner()),
        entry_number: Set(entry.entry_number),
        entry_date: Set(entry.entry_date),
        description: Set(entry.description.clone()),
        reference: Set(entry.reference.clone()),
        source_type: Set(entry.source_type.as_str().to_string()),
        status: Set(entry.status.as_str().to_string()),
        created_by: Set(entry.created_by.into_inner()),
        created_at: Set(stamp(entry.created_at)),
        posted_at: Set(entry.posted_at.map(stamp)),
        posted_by: Set(entry.posted_by.map(ActorId::into_inner)),
        voided_at: Set(entry.voided_at.map(stamp)),
        voided_by: Set(entry.voided_by.map(ActorId::into_inner)),
        void_reason: Set(entry.void_reason.clone()),
        reversal_of_entry_id: Set(entry.reversal_of_entry_id.map(JournalEntryId::into_inner)),
    }
}
