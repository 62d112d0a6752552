//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration and cover the `public`
//! schema only. Per-tenant ledger tables are created by
//! [`crate::provision::provision_tenant`].

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_tenants;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000001_tenants::Migration)]
    }
}
