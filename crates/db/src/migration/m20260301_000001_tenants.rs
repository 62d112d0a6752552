//! Tenant registry.
//!
//! Creates `public.tenants`, mapping each tenant to the schema that holds its
//! ledger and to its base currency.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(TENANTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const TENANTS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS public.tenants (
    id              UUID PRIMARY KEY,
    name            VARCHAR(255) NOT NULL,
    schema_name     VARCHAR(63) NOT NULL UNIQUE,
    base_currency   CHAR(3) NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_schema_name CHECK (schema_name ~ '^[a-z_][a-z0-9_]{0,62}$'),
    CONSTRAINT chk_base_currency CHECK (base_currency ~ '^[A-Z]{3}$')
);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS public.tenants;
";
