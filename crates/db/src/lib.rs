//! Database layer for Tally.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Tenant provisioning: one schema per tenant
//! - Tenant-scoped transactions
//! - [`PgLedgerStore`], the PostgreSQL ledger store
//! - Database migrations for the shared `public` schema

pub mod entities;
pub mod migration;
pub mod provision;
pub mod scope;
pub mod store;

pub use provision::{NewTenant, ProvisionError, find_tenant, provision_tenant};
pub use scope::TenantScope;
pub use store::{PgLedgerStore, PgReader, PgWriter};

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tally_shared::config::DatabaseConfig;

/// Establishes a connection pool sized by `config`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
