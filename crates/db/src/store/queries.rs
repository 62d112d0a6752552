//! Read queries shared by snapshot readers and writers.
//!
//! Every query filters on the scope's tenant id in addition to running
//! inside the tenant's schema.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select,
};
use tally_core::chart::types::{Account, CostCenter};
use tally_core::ledger::entry::{JournalEntry, JournalEntryLine};
use tally_core::store::{AccountTotals, DateRange, EntryFilter, PostedLine, StoreError};
use tally_shared::types::{AccountId, CostCenterId, JournalEntryId, PageRequest, PageResponse};
use uuid::Uuid;

use super::rows::{self, store_err};
use crate::entities::{accounts, cost_centers, journal_entries, journal_entry_lines};
use crate::scope::TenantScope;

/// Statuses whose lines count towards balances.
const BOOKED: [&str; 2] = ["POSTED", "VOID"];

pub(crate) async fn get_account(
    scope: &TenantScope,
    id: AccountId,
) -> Result<Option<Account>, StoreError> {
    accounts::Entity::find_by_id(id.into_inner())
        .filter(accounts::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .one(scope.transaction())
        .await
        .map_err(store_err)?
        .map(rows::account)
        .transpose()
}

pub(crate) async fn find_account_by_code(
    scope: &TenantScope,
    code: &str,
) -> Result<Option<Account>, StoreError> {
    accounts::Entity::find()
        .filter(accounts::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .filter(accounts::Column::Code.eq(code))
        .one(scope.transaction())
        .await
        .map_err(store_err)?
        .map(rows::account)
        .transpose()
}

pub(crate) async fn list_accounts(
    scope: &TenantScope,
    active_only: bool,
) -> Result<Vec<Account>, StoreError> {
    let mut query = accounts::Entity::find()
        .filter(accounts::Column::TenantId.eq(scope.tenant_id().into_inner()));
    if active_only {
        query = query.filter(accounts::Column::IsActive.eq(true));
    }

    query
        .order_by_asc(accounts::Column::Code)
        .all(scope.transaction())
        .await
        .map_err(store_err)?
        .into_iter()
        .map(rows::account)
        .collect()
}

pub(crate) async fn account_is_referenced(
    scope: &TenantScope,
    id: AccountId,
) -> Result<bool, StoreError> {
    let count = journal_entry_lines::Entity::find()
        .filter(journal_entry_lines::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .filter(journal_entry_lines::Column::AccountId.eq(id.into_inner()))
        .count(scope.transaction())
        .await
        .map_err(store_err)?;
    Ok(count > 0)
}

pub(crate) async fn get_cost_center(
    scope: &TenantScope,
    id: CostCenterId,
) -> Result<Option<CostCenter>, StoreError> {
    let row = cost_centers::Entity::find_by_id(id.into_inner())
        .filter(cost_centers::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .one(scope.transaction())
        .await
        .map_err(store_err)?;
    Ok(row.map(rows::cost_center))
}

pub(crate) async fn find_cost_center_by_code(
    scope: &TenantScope,
    code: &str,
) -> Result<Option<CostCenter>, StoreError> {
    let row = cost_centers::Entity::find()
        .filter(cost_centers::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .filter(cost_centers::Column::Code.eq(code))
        .one(scope.transaction())
        .await
        .map_err(store_err)?;
    Ok(row.map(rows::cost_center))
}

pub(crate) async fn list_cost_centers(scope: &TenantScope) -> Result<Vec<CostCenter>, StoreError> {
    let found = cost_centers::Entity::find()
        .filter(cost_centers::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .order_by_asc(cost_centers::Column::Code)
        .all(scope.transaction())
        .await
        .map_err(store_err)?;
    Ok(found.into_iter().map(rows::cost_center).collect())
}

pub(crate) async fn get_entry(
    scope: &TenantScope,
    id: JournalEntryId,
) -> Result<Option<JournalEntry>, StoreError> {
    let query = journal_entries::Entity::find_by_id(id.into_inner())
        .filter(journal_entries::Column::TenantId.eq(scope.tenant_id().into_inner()));
    load_entry(scope, query).await
}

/// Fetches one entry header matched by `query` and attaches its lines.
pub(crate) async fn load_entry(
    scope: &TenantScope,
    query: Select<journal_entries::Entity>,
) -> Result<Option<JournalEntry>, StoreError> {
    let Some(header) = query.one(scope.transaction()).await.map_err(store_err)? else {
        return Ok(None);
    };

    let lines = journal_entry_lines::Entity::find()
        .filter(journal_entry_lines::Column::JournalEntryId.eq(header.id))
        .order_by_asc(journal_entry_lines::Column::LineNumber)
        .all(scope.transaction())
        .await
        .map_err(store_err)?
        .into_iter()
        .map(rows::line)
        .collect::<Result<Vec<_>, _>>()?;

    rows::entry(header, lines).map(Some)
}

pub(crate) async fn list_entries(
    scope: &TenantScope,
    filter: &EntryFilter,
    page: &PageRequest,
) -> Result<PageResponse<JournalEntry>, StoreError> {
    let mut query = journal_entries::Entity::find()
        .filter(journal_entries::Column::TenantId.eq(scope.tenant_id().into_inner()));

    if let Some(status) = filter.status {
        query = query.filter(journal_entries::Column::Status.eq(status.as_str()));
    }
    if let Some(from) = filter.date_from {
        query = query.filter(journal_entries::Column::EntryDate.gte(from));
    }
    if let Some(to) = filter.date_to {
        query = query.filter(journal_entries::Column::EntryDate.lte(to));
    }
    if let Some(source) = filter.source_type {
        query = query.filter(journal_entries::Column::SourceType.eq(source.as_str()));
    }
    if let Some(original) = filter.reversal_of {
        query = query.filter(journal_entries::Column::ReversalOfEntryId.eq(original.into_inner()));
    }
    if let Some(account_id) = filter.account_id {
        query = query.filter(
            journal_entries::Column::Id.in_subquery(
                Query::select()
                    .column(journal_entry_lines::Column::JournalEntryId)
                    .from(journal_entry_lines::Entity)
                    .and_where(journal_entry_lines::Column::AccountId.eq(account_id.into_inner()))
                    .to_owned(),
            ),
        );
    }

    let total = query.clone().count(scope.transaction()).await.map_err(store_err)?;

    // Postgres sorts NULL numbers last in ascending order, drafts included.
    let headers = query
        .order_by_asc(journal_entries::Column::EntryDate)
        .order_by_asc(journal_entries::Column::EntryNumber)
        .order_by_asc(journal_entries::Column::CreatedAt)
        .order_by_asc(journal_entries::Column::Id)
        .offset(page.offset())
        .limit(page.limit())
        .all(scope.transaction())
        .await
        .map_err(store_err)?;

    let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
    let mut lines_by_entry: HashMap<Uuid, Vec<JournalEntryLine>> = HashMap::new();
    if !ids.is_empty() {
        let line_rows = journal_entry_lines::Entity::find()
            .filter(journal_entry_lines::Column::JournalEntryId.is_in(ids))
            .order_by_asc(journal_entry_lines::Column::JournalEntryId)
            .order_by_asc(journal_entry_lines::Column::LineNumber)
            .all(scope.transaction())
            .await
            .map_err(store_err)?;
        for row in line_rows {
            let entry_id = row.journal_entry_id;
            lines_by_entry.entry(entry_id).or_default().push(rows::line(row)?);
        }
    }

    let data = headers
        .into_iter()
        .map(|header| {
            let lines = lines_by_entry.remove(&header.id).unwrap_or_default();
            rows::entry(header, lines)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PageResponse::new(data, page.page, page.per_page, total))
}

#[derive(Debug, FromQueryResult)]
struct TotalsRow {
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
}

pub(crate) async fn account_totals(
    scope: &TenantScope,
    range: DateRange,
    account_id: Option<AccountId>,
) -> Result<Vec<AccountTotals>, StoreError> {
    let mut query = journal_entry_lines::Entity::find()
        .join(
            JoinType::InnerJoin,
            journal_entry_lines::Relation::JournalEntries.def(),
        )
        .filter(journal_entry_lines::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .filter(journal_entries::Column::Status.is_in(BOOKED));
    query = booked_within(query, range);
    if let Some(account_id) = account_id {
        query = query.filter(journal_entry_lines::Column::AccountId.eq(account_id.into_inner()));
    }

    let totals: Vec<TotalsRow> = query
        .select_only()
        .column(journal_entry_lines::Column::AccountId)
        .column_as(journal_entry_lines::Column::BaseDebit.sum(), "debit")
        .column_as(journal_entry_lines::Column::BaseCredit.sum(), "credit")
        .group_by(journal_entry_lines::Column::AccountId)
        .into_model::<TotalsRow>()
        .all(scope.transaction())
        .await
        .map_err(store_err)?;

    Ok(totals
        .into_iter()
        .map(|row| AccountTotals {
            account_id: AccountId::from_uuid(row.account_id),
            debit: row.debit,
            credit: row.credit,
        })
        .collect())
}

#[derive(Debug, FromQueryResult)]
struct PostedLineRow {
    id: Uuid,
    tenant_id: Uuid,
    journal_entry_id: Uuid,
    line_number: i32,
    account_id: Uuid,
    debit_amount: Decimal,
    credit_amount: Decimal,
    currency: String,
    base_debit: Decimal,
    base_credit: Decimal,
    cost_center_id: Option<Uuid>,
    memo: Option<String>,
    // Entry header fields (aliased)
    entry_number: Option<i64>,
    entry_date: NaiveDate,
    entry_description: String,
    entry_status: String,
}

pub(crate) async fn posted_lines(
    scope: &TenantScope,
    account_id: AccountId,
    range: DateRange,
) -> Result<Vec<PostedLine>, StoreError> {
    let query = journal_entry_lines::Entity::find()
        .join(
            JoinType::InnerJoin,
            journal_entry_lines::Relation::JournalEntries.def(),
        )
        .filter(journal_entry_lines::Column::TenantId.eq(scope.tenant_id().into_inner()))
        .filter(journal_entry_lines::Column::AccountId.eq(account_id.into_inner()))
        .filter(journal_entries::Column::Status.is_in(BOOKED));

    let found: Vec<PostedLineRow> = booked_within(query, range)
        .column_as(journal_entries::Column::EntryNumber, "entry_number")
        .column_as(journal_entries::Column::EntryDate, "entry_date")
        .column_as(journal_entries::Column::Description, "entry_description")
        .column_as(journal_entries::Column::Status, "entry_status")
        .order_by_asc(journal_entries::Column::EntryDate)
        .order_by_asc(journal_entries::Column::EntryNumber)
        .order_by_asc(journal_entry_lines::Column::LineNumber)
        .into_model::<PostedLineRow>()
        .all(scope.transaction())
        .await
        .map_err(store_err)?;

    found.into_iter().map(posted_line).collect()
}

fn posted_line(row: PostedLineRow) -> Result<PostedLine, StoreError> {
    let status = rows::entry_status(row.journal_entry_id, &row.entry_status)?;
    let entry_number = row.entry_number.ok_or_else(|| {
        StoreError::Backend(format!("Booked entry {} has no number", row.journal_entry_id))
    })?;
    let line = rows::line(journal_entry_lines::Model {
        id: row.id,
        tenant_id: row.tenant_id,
        journal_entry_id: row.journal_entry_id,
        line_number: row.line_number,
        account_id: row.account_id,
        debit_amount: row.debit_amount,
        credit_amount: row.credit_amount,
        currency: row.currency,
        base_debit: row.base_debit,
        base_credit: row.base_credit,
        cost_center_id: row.cost_center_id,
        memo: row.memo,
    })?;

    Ok(PostedLine {
        entry_id: JournalEntryId::from_uuid(row.journal_entry_id),
        entry_number,
        entry_date: row.entry_date,
        description: row.entry_description,
        status,
        line,
    })
}

fn booked_within(
    mut query: Select<journal_entry_lines::Entity>,
    range: DateRange,
) -> Select<journal_entry_lines::Entity> {
    if let Some(from) = range.from {
        query = query.filter(journal_entries::Column::EntryDate.gte(from));
    }
    if let Some(to) = range.to {
        query = query.filter(journal_entries::Column::EntryDate.lte(to));
    }
    query
}
