//! PostgreSQL implementation of the ledger store.
//!
//! Readers are `REPEATABLE READ` read-only transactions, writers are plain
//! read-write transactions, both bound to the tenant's schema through a
//! [`TenantScope`]. Entry numbers come from the per-tenant
//! `entry_sequences` row, whose upsert also serializes concurrent posts of
//! one tenant until the posting transaction ends.

mod queries;
mod rows;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, QuerySelect, Statement, TransactionTrait,
};
use tally_core::chart::types::{Account, CostCenter};
use tally_core::ledger::entry::JournalEntry;
use tally_core::store::{
    AccountTotals, DateRange, EntryFilter, LedgerRead, LedgerStore, LedgerWrite, PostedLine,
    StoreError,
};
use tally_shared::TenantContext;
use tally_shared::types::{
    AccountId, ActorId, CostCenterId, JournalEntryId, PageRequest, PageResponse,
};
use tracing::{debug, instrument};

use crate::entities::{accounts, cost_centers, journal_entries, journal_entry_lines};
use crate::scope::TenantScope;
use rows::{stamp, store_err};

/// Ledger store backed by a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a store over an open connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl LedgerStore for PgLedgerStore {
    type Reader = PgReader;
    type Writer = PgWriter;

    async fn reader(&self, tenant: &TenantContext) -> Result<PgReader, StoreError> {
        let scope = TenantScope::begin_snapshot(&self.db, tenant)
            .await
            .map_err(store_err)?;
        Ok(PgReader { scope })
    }

    async fn writer(&self, tenant: &TenantContext) -> Result<PgWriter, StoreError> {
        let scope = TenantScope::begin(&self.db, tenant)
            .await
            .map_err(store_err)?;
        Ok(PgWriter { scope })
    }
}

/// Read-only snapshot of one tenant's ledger. Rolled back on drop.
pub struct PgReader {
    scope: TenantScope,
}

/// Unit of work on one tenant's ledger. Rolled back unless committed.
pub struct PgWriter {
    scope: TenantScope,
}

macro_rules! impl_ledger_read {
    ($ty:ty) => {
        impl LedgerRead for $ty {
            async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
                queries::get_account(&self.scope, id).await
            }

            async fn find_account_by_code(
                &self,
                code: &str,
            ) -> Result<Option<Account>, StoreError> {
                queries::find_account_by_code(&self.scope, code).await
            }

            async fn list_accounts(&self, active_only: bool) -> Result<Vec<Account>, StoreError> {
                queries::list_accounts(&self.scope, active_only).await
            }

            async fn account_is_referenced(&self, id: AccountId) -> Result<bool, StoreError> {
                queries::account_is_referenced(&self.scope, id).await
            }

            async fn get_cost_center(
                &self,
                id: CostCenterId,
            ) -> Result<Option<CostCenter>, StoreError> {
                queries::get_cost_center(&self.scope, id).await
            }

            async fn find_cost_center_by_code(
                &self,
                code: &str,
            ) -> Result<Option<CostCenter>, StoreError> {
                queries::find_cost_center_by_code(&self.scope, code).await
            }

            async fn list_cost_centers(&self) -> Result<Vec<CostCenter>, StoreError> {
                queries::list_cost_centers(&self.scope).await
            }

            async fn get_entry(
                &self,
                id: JournalEntryId,
            ) -> Result<Option<JournalEntry>, StoreError> {
                queries::get_entry(&self.scope, id).await
            }

            async fn list_entries(
                &self,
                filter: &EntryFilter,
                page: &PageRequest,
            ) -> Result<PageResponse<JournalEntry>, StoreError> {
                queries::list_entries(&self.scope, filter, page).await
            }

            async fn account_totals(
                &self,
                range: DateRange,
                account_id: Option<AccountId>,
            ) -> Result<Vec<AccountTotals>, StoreError> {
                queries::account_totals(&self.scope, range, account_id).await
            }

            async fn posted_lines(
                &self,
                account_id: AccountId,
                range: DateRange,
            ) -> Result<Vec<PostedLine>, StoreError> {
                queries::posted_lines(&self.scope, account_id, range).await
            }
        }
    };
}

impl_ledger_read!(PgReader);
impl_ledger_read!(PgWriter);

#[derive(Debug, FromQueryResult)]
struct SequenceRow {
    last_number: i64,
}

/// Draws the next number, creating the sequence row on first use.
const NEXT_NUMBER_SQL: &str = r"
INSERT INTO entry_sequences (tenant_id, last_number)
VALUES ($1, 1)
ON CONFLICT (tenant_id)
DO UPDATE SET last_number = entry_sequences.last_number + 1
RETURNING last_number
";

impl PgWriter {
    fn tenant_uuid(&self) -> uuid::Uuid {
        self.scope.tenant_id().into_inner()
    }

    async fn insert_lines(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        if entry.lines.is_empty() {
            return Ok(());
        }
        let models = entry
            .lines
            .iter()
            .map(|line| rows::line_model(self.scope.tenant_id(), line));
        journal_entry_lines::Entity::insert_many(models)
            .exec_without_returning(self.scope.transaction())
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

impl LedgerWrite for PgWriter {
    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        accounts::Entity::insert(rows::account_model(account))
            .exec_without_returning(self.scope.transaction())
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), StoreError> {
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::Code, Expr::value(account.code.clone()))
            .col_expr(accounts::Column::Name, Expr::value(account.name.clone()))
            .col_expr(
                accounts::Column::AccountType,
                Expr::value(account.account_type.as_str()),
            )
            .col_expr(accounts::Column::IsActive, Expr::value(account.is_active))
            .col_expr(
                accounts::Column::UpdatedAt,
                Expr::value(stamp(account.updated_at)),
            )
            .filter(accounts::Column::Id.eq(account.id.into_inner()))
            .filter(accounts::Column::TenantId.eq(self.tenant_uuid()))
            .exec(self.scope.transaction())
            .await
            .map_err(store_err)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("account {}", account.id)));
        }
        Ok(())
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), StoreError> {
        let result = accounts::Entity::delete_many()
            .filter(accounts::Column::Id.eq(id.into_inner()))
            .filter(accounts::Column::TenantId.eq(self.tenant_uuid()))
            .exec(self.scope.transaction())
            .await
            .map_err(store_err)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("account {id}")));
        }
        Ok(())
    }

    async fn insert_cost_center(&mut self, cost_center: &CostCenter) -> Result<(), StoreError> {
        cost_centers::Entity::insert(rows::cost_center_model(cost_center))
            .exec_without_returning(self.scope.transaction())
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn lock_entry(&mut self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        let query = journal_entries::Entity::find_by_id(id.into_inner())
            .filter(journal_entries::Column::TenantId.eq(self.tenant_uuid()))
            .lock_exclusive();
        queries::load_entry(&self.scope, query).await
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        journal_entries::Entity::insert(rows::entry_model(entry))
            .exec_without_returning(self.scope.transaction())
            .await
            .map_err(store_err)?;
        self.insert_lines(entry).await
    }

    async fn replace_draft(&mut self, entry: &JournalEntry) -> Result<(), StoreError> {
        let result = journal_entries::Entity::update_many()
            .col_expr(journal_entries::Column::EntryDate, Expr::value(entry.entry_date))
            .col_expr(
                journal_entries::Column::Description,
                Expr::value(entry.description.clone()),
            )
            .col_expr(
                journal_entries::Column::Reference,
                Expr::value(entry.reference.clone()),
            )
            .col_expr(
                journal_entries::Column::SourceType,
                Expr::value(entry.source_type.as_str()),
            )
            .filter(journal_entries::Column::Id.eq(entry.id.into_inner()))
            .filter(journal_entries::Column::TenantId.eq(self.tenant_uuid()))
            .filter(journal_entries::Column::Status.eq("DRAFT"))
            .exec(self.scope.transaction())
            .await
            .map_err(store_err)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("draft {}", entry.id)));
        }

        journal_entry_lines::Entity::delete_many()
            .filter(journal_entry_lines::Column::JournalEntryId.eq(entry.id.into_inner()))
            .exec(self.scope.transaction())
            .await
            .map_err(store_err)?;
        self.insert_lines(entry).await
    }

    async fn delete_draft(&mut self, id: JournalEntryId) -> Result<(), StoreError> {
        // Lines go with the header through ON DELETE CASCADE.
        let result = journal_entries::Entity::delete_many()
            .filter(journal_entries::Column::Id.eq(id.into_inner()))
            .filter(journal_entries::Column::TenantId.eq(self.tenant_uuid()))
            .filter(journal_entries::Column::Status.eq("DRAFT"))
            .exec(self.scope.transaction())
            .await
            .map_err(store_err)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("draft {id}")));
        }
        Ok(())
    }

    async fn next_entry_number(&mut self) -> Result<i64, StoreError> {
        let row = SequenceRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            NEXT_NUMBER_SQL,
            [self.tenant_uuid().into()],
        ))
        .one(self.scope.transaction())
        .await
        .map_err(store_err)?
        .ok_or_else(|| StoreError::Backend("Entry sequence returned no row".to_string()))?;

        Ok(row.last_number)
    }

    #[instrument(skip(self, posted_at))]
    async fn mark_posted(
        &mut self,
        id: JournalEntryId,
        entry_number: i64,
        posted_at: DateTime<Utc>,
        posted_by: ActorId,
    ) -> Result<(), StoreError> {
        // A failed statement aborts the whole transaction in Postgres; the
        // savepoint keeps the writer usable after a number conflict.
        let savepoint = self.scope.transaction().begin().await.map_err(store_err)?;

        let result = journal_entries::Entity::update_many()
            .col_expr(journal_entries::Column::Status, Expr::value("POSTED"))
            .col_expr(journal_entries::Column::EntryNumber, Expr::value(entry_number))
            .col_expr(journal_entries::Column::PostedAt, Expr::value(stamp(posted_at)))
            .col_expr(
                journal_entries::Column::PostedBy,
                Expr::value(posted_by.into_inner()),
            )
            .filter(journal_entries::Column::Id.eq(id.into_inner()))
            .filter(journal_entries::Column::TenantId.eq(self.tenant_uuid()))
            .filter(journal_entries::Column::Status.eq("DRAFT"))
            .exec(&savepoint)
            .await;

        match result {
            Ok(done) if done.rows_affected == 1 => savepoint.commit().await.map_err(store_err),
            Ok(_) => {
                savepoint.rollback().await.map_err(store_err)?;
                Err(StoreError::NotFound(format!("draft {id}")))
            }
            Err(err) => {
                savepoint.rollback().await.map_err(store_err)?;
                debug!(error = %err, "Posting rolled back to savepoint");
                Err(store_err(err))
            }
        }
    }

    async fn mark_void(
        &mut self,
        id: JournalEntryId,
        voided_at: DateTime<Utc>,
        voided_by: ActorId,
        reason: &str,
    ) -> Result<(), StoreError> {
        let result = journal_entries::Entity::update_many()
            .col_expr(journal_entries::Column::Status, Expr::value("VOID"))
            .col_expr(journal_entries::Column::VoidedAt, Expr::value(stamp(voided_at)))
            .col_expr(
                journal_entries::Column::VoidedBy,
                Expr::value(voided_by.into_inner()),
            )
            .col_expr(journal_entries::Column::VoidReason, Expr::value(reason))
            .filter(journal_entries::Column::Id.eq(id.into_inner()))
            .filter(journal_entries::Column::TenantId.eq(self.tenant_uuid()))
            .filter(journal_entries::Column::Status.eq("POSTED"))
            .exec(self.scope.transaction())
            .await
            .map_err(store_err)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("posted entry {id}")));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.scope.commit().await.map_err(store_err)
    }
}
