//! Migration runner for Tally.
//!
//! Manages the `public` schema only; tenant schemas are created by the
//! seeder or by whatever provisions tenants.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations

use sea_orm_migration::prelude::*;
use tally_db::migration::Migrator;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The migrator CLI reads DATABASE_URL and sets up its own tracing.
    cli::run_cli(Migrator).await;
}
