//! Tenant-scoped database transactions.
//!
//! Every ledger query runs inside a [`TenantScope`]: a transaction whose
//! `search_path` points at the tenant's schema and whose
//! `app.current_tenant_id` is set, both with `SET LOCAL` so they end with
//! the transaction.
//!
//! # Usage
//!
//! ```ignore
//! use tally_db::TenantScope;
//!
//! let scope = TenantScope::begin(&db, &tenant).await?;
//! let accounts = Accounts::find().all(scope.transaction()).await?;
//! scope.commit().await?;
//! ```

use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel,
    TransactionTrait,
};
use tally_shared::TenantContext;
use tally_shared::types::TenantId;

/// A transaction bound to one tenant's schema.
pub struct TenantScope {
    txn: DatabaseTransaction,
    tenant_id: TenantId,
}

impl TenantScope {
    /// Begins a read-write transaction for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or scoped.
    pub async fn begin(db: &DatabaseConnection, tenant: &TenantContext) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        Self::enter(txn, tenant).await
    }

    /// Begins a `REPEATABLE READ` read-only transaction for `tenant`, so
    /// every query sees the same snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or scoped.
    pub async fn begin_snapshot(
        db: &DatabaseConnection,
        tenant: &TenantContext,
    ) -> Result<Self, DbErr> {
        let txn = db
            .begin_with_config(
                Some(IsolationLevel::RepeatableRead),
                Some(AccessMode::ReadOnly),
            )
            .await?;
        Self::enter(txn, tenant).await
    }

    async fn enter(txn: DatabaseTransaction, tenant: &TenantContext) -> Result<Self, DbErr> {
        for sql in scope_statements(tenant) {
            txn.execute_unprepared(&sql).await?;
        }
        Ok(Self {
            txn,
            tenant_id: tenant.tenant_id(),
        })
    }

    /// The underlying transaction.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// The tenant this scope is bound to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Statements that bind a transaction to `tenant`.
///
/// The schema name is a validated lowercase identifier, see
/// [`TenantContext::new`].
pub(crate) fn scope_statements(tenant: &TenantContext) -> [String; 2] {
    [
        format!(
            "SET LOCAL search_path TO \"{}\", public",
            tenant.schema_name()
        ),
        format!(
            "SET LOCAL app.current_tenant_id = '{}'",
            tenant.tenant_id()
        ),
    ]
}
