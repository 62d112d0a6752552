//! Tenant provisioning.
//!
//! A tenant is a row in `public.tenants` plus a schema of its own holding
//! the ledger tables. Both are created in one transaction.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Set, SqlErr,
    TransactionTrait,
};
use tally_shared::types::{CurrencyCode, TenantId};
use tally_shared::{TenantContext, TenantContextError};
use thiserror::Error;
use tracing::{info, instrument};

use crate::entities::tenants;
use crate::scope::scope_statements;

/// Error types for tenant provisioning.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Schema name or currency rejected.
    #[error("Invalid tenant: {0}")]
    InvalidTenant(#[from] TenantContextError),

    /// Another tenant already uses the schema.
    #[error("Schema '{0}' is already provisioned")]
    DuplicateSchema(String),

    /// Stored tenant row is unreadable.
    #[error("Corrupt tenant record {0}")]
    CorruptRecord(TenantId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for provisioning a tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    /// Display name.
    pub name: String,
    /// Schema to create, a lowercase identifier.
    pub schema_name: String,
    /// Reporting currency.
    pub base_currency: CurrencyCode,
}

/// Registers a tenant and creates its ledger schema.
///
/// # Errors
///
/// - [`ProvisionError::InvalidTenant`] for a malformed schema name
/// - [`ProvisionError::DuplicateSchema`] if the schema is taken
#[instrument(skip(db, input), fields(schema = %input.schema_name))]
pub async fn provision_tenant(
    db: &DatabaseConnection,
    input: &NewTenant,
) -> Result<TenantContext, ProvisionError> {
    let tenant = TenantContext::new(
        TenantId::new(),
        input.schema_name.clone(),
        input.base_currency.clone(),
    )?;

    let txn = db.begin().await?;

    tenants::ActiveModel {
        id: Set(tenant.tenant_id().into_inner()),
        name: Set(input.name.clone()),
        schema_name: Set(tenant.schema_name().to_string()),
        base_currency: Set(tenant.base_currency().as_str().to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ProvisionError::DuplicateSchema(input.schema_name.clone())
        }
        _ => ProvisionError::Database(err),
    })?;

    txn.execute_unprepared(&format!("CREATE SCHEMA \"{}\"", tenant.schema_name()))
        .await?;
    for sql in scope_statements(&tenant) {
        txn.execute_unprepared(&sql).await?;
    }
    txn.execute_unprepared(LEDGER_TABLES_SQL).await?;
    txn.execute_unprepared(TRIGGERS_SQL).await?;
    txn.commit().await?;

    info!(tenant_id = %tenant.tenant_id(), "Tenant provisioned");
    Ok(tenant)
}

/// Loads a tenant's context from the registry.
///
/// # Errors
///
/// Returns an error if the query fails or the stored row is invalid.
pub async fn find_tenant(
    db: &DatabaseConnection,
    tenant_id: TenantId,
) -> Result<Option<TenantContext>, ProvisionError> {
    let Some(row) = tenants::Entity::find_by_id(tenant_id.into_inner())
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let currency = CurrencyCode::parse(&row.base_currency)
        .map_err(|_| ProvisionError::CorruptRecord(tenant_id))?;
    Ok(Some(TenantContext::new(tenant_id, row.schema_name, currency)?))
}

// ============================================================
// SQL CONSTANTS
// ============================================================

/// Ledger tables, created inside the tenant schema via `search_path`.
const LEDGER_TABLES_SQL: &str = r"
CREATE TABLE accounts (
    id              UUID PRIMARY KEY,
    tenant_id       UUID NOT NULL,
    code            VARCHAR(20) NOT NULL,
    name            VARCHAR(255) NOT NULL,
    account_type    VARCHAR(16) NOT NULL,
    is_system       BOOLEAN NOT NULL DEFAULT FALSE,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_accounts_code UNIQUE (tenant_id, code),
    CONSTRAINT chk_account_code CHECK (length(btrim(code)) > 0),
    CONSTRAINT chk_account_type CHECK (
        account_type IN ('ASSET', 'LIABILITY', 'EQUITY', 'REVENUE', 'EXPENSE')
    )
);

CREATE TABLE cost_centers (
    id              UUID PRIMARY KEY,
    tenant_id       UUID NOT NULL,
    code            VARCHAR(20) NOT NULL,
    name            VARCHAR(255) NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_cost_centers_code UNIQUE (tenant_id, code)
);

CREATE TABLE journal_entries (
    id                      UUID PRIMARY KEY,
    tenant_id               UUID NOT NULL,
    entry_number            BIGINT,
    entry_date              DATE NOT NULL,
    description             TEXT NOT NULL,
    reference               VARCHAR(255),
    source_type             VARCHAR(32) NOT NULL DEFAULT 'MANUAL',
    status                  VARCHAR(8) NOT NULL DEFAULT 'DRAFT',
    created_by              UUID NOT NULL,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    posted_at               TIMESTAMPTZ,
    posted_by               UUID,
    voided_at               TIMESTAMPTZ,
    voided_by               UUID,
    void_reason             TEXT,
    reversal_of_entry_id    UUID REFERENCES journal_entries(id),

    CONSTRAINT uq_entry_number UNIQUE (tenant_id, entry_number),
    CONSTRAINT chk_status CHECK (status IN ('DRAFT', 'POSTED', 'VOID')),
    CONSTRAINT chk_source_type CHECK (
        source_type IN (
            'MANUAL', 'INVOICE', 'PAYMENT', 'PAYROLL', 'BANKING', 'ADJUSTMENT', 'OPENING_BALANCE'
        )
    ),
    CONSTRAINT chk_numbered CHECK ((status = 'DRAFT') = (entry_number IS NULL)),
    CONSTRAINT chk_posted_audit CHECK (
        status = 'DRAFT' OR (posted_at IS NOT NULL AND posted_by IS NOT NULL)
    ),
    CONSTRAINT chk_void_audit CHECK (
        status <> 'VOID'
        OR (voided_at IS NOT NULL AND voided_by IS NOT NULL AND void_reason IS NOT NULL)
    )
);

CREATE INDEX idx_journal_entries_date ON journal_entries (tenant_id, entry_date, entry_number);
CREATE INDEX idx_journal_entries_reversal ON journal_entries (reversal_of_entry_id);

CREATE TABLE journal_entry_lines (
    id                  UUID PRIMARY KEY,
    tenant_id           UUID NOT NULL,
    journal_entry_id    UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    line_number         INTEGER NOT NULL,
    account_id          UUID NOT NULL REFERENCES accounts(id),
    debit_amount        NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit_amount       NUMERIC(19, 4) NOT NULL DEFAULT 0,
    currency            CHAR(3) NOT NULL,
    base_debit          NUMERIC(19, 4) NOT NULL DEFAULT 0,
    base_credit         NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cost_center_id      UUID REFERENCES cost_centers(id),
    memo                TEXT,

    CONSTRAINT uq_line_number UNIQUE (journal_entry_id, line_number),
    CONSTRAINT chk_non_negative CHECK (
        debit_amount >= 0 AND credit_amount >= 0 AND base_debit >= 0 AND base_credit >= 0
    ),
    CONSTRAINT chk_one_side CHECK (
        (debit_amount > 0 AND credit_amount = 0 AND base_debit > 0 AND base_credit = 0)
        OR (credit_amount > 0 AND debit_amount = 0 AND base_credit > 0 AND base_debit = 0)
    )
);

CREATE INDEX idx_journal_entry_lines_account ON journal_entry_lines (account_id);

CREATE TABLE entry_sequences (
    tenant_id       UUID PRIMARY KEY,
    last_number     BIGINT NOT NULL CHECK (last_number >= 0)
);
";

/// Lines of posted and voided entries cannot change.
const TRIGGERS_SQL: &str = r"
CREATE FUNCTION prevent_booked_line_change() RETURNS TRIGGER
SET search_path FROM CURRENT
AS $$
BEGIN
    IF EXISTS (
        SELECT 1 FROM journal_entries e
        WHERE e.id = OLD.journal_entry_id AND e.status <> 'DRAFT'
    ) THEN
        RAISE EXCEPTION 'Journal entry % is not a draft', OLD.journal_entry_id;
    END IF;
    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_journal_entry_lines_immutable
    BEFORE UPDATE OR DELETE ON journal_entry_lines
    FOR EACH ROW EXECUTE FUNCTION prevent_booked_line_change();
";
