//! Demo data seeder for Tally.
//!
//! Applies migrations, provisions a demo tenant, seeds the default chart of
//! accounts and books a handful of entries, one of them voided, then logs
//! the resulting trial balance.
//!
//! Usage: cargo run --bin seeder
//!
//! `SEED_SCHEMA` overrides the demo schema name (default `tenant_demo`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal_macros::dec;
use sea_orm_migration::MigratorTrait;
use tally_core::ledger::entry::{NewJournalEntry, NewJournalLine};
use tally_core::{
    AccountRegistry, FiscalYearStart, PostingEngine, SourceType, StatementBuilder,
};
use tally_db::migration::Migrator;
use tally_db::{NewTenant, PgLedgerStore, ProvisionError, provision_tenant};
use tally_shared::AppConfig;
use tally_shared::telemetry::init_tracing;
use tally_shared::types::{AccountId, ActorId, CurrencyCode};
use tracing::{info, warn};

const DEFAULT_SCHEMA: &str = "tenant_demo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    let db = tally_db::connect(&config.database).await?;
    Migrator::up(&db, None).await?;
    info!("Migrations applied");

    let schema_name = std::env::var("SEED_SCHEMA").unwrap_or_else(|_| DEFAULT_SCHEMA.to_string());
    let base_currency = CurrencyCode::parse(&config.ledger.default_base_currency)?;
    let tenant = match provision_tenant(
        &db,
        &NewTenant {
            name: "Demo Trading Co".to_string(),
            schema_name: schema_name.clone(),
            base_currency: base_currency.clone(),
        },
    )
    .await
    {
        Ok(tenant) => tenant,
        Err(ProvisionError::DuplicateSchema(schema)) => {
            warn!(schema = %schema, "Demo tenant already exists, skipping");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let store = Arc::new(PgLedgerStore::new(db));
    let registry = AccountRegistry::new(Arc::clone(&store));
    let engine = PostingEngine::new(Arc::clone(&store));
    let fiscal_year_start = FiscalYearStart::from_config(&config.ledger)?;
    let statements = StatementBuilder::new(store, fiscal_year_start);
    let actor = ActorId::new();

    let accounts: HashMap<String, AccountId> = registry
        .seed_default_chart(&tenant)
        .await?
        .into_iter()
        .map(|account| (account.code, account.id))
        .collect();
    let account = |code: &str| {
        accounts
            .get(code)
            .copied()
            .with_context(|| format!("Default chart has no account {code}"))
    };
    let ops = registry
        .create_cost_center(&tenant, "OPS", "Operations")
        .await?;
    info!(accounts = accounts.len(), "Chart of accounts seeded");

    let today = Utc::now().date_naive();
    let Some(month_start) = NaiveDate::from_ymd_opt(today.year(), today.month(), 1) else {
        bail!("Cannot compute the start of the current month");
    };
    let usd = base_currency;

    let entries = vec![
        NewJournalEntry::manual(
            month_start,
            "Owner investment",
            vec![
                NewJournalLine::debit(account("1000")?, dec!(50000), usd.clone()),
                NewJournalLine::credit(account("3000")?, dec!(50000), usd.clone()),
            ],
        )
        .with_source(SourceType::OpeningBalance),
        NewJournalEntry::manual(
            month_start,
            "Office rent",
            vec![
                NewJournalLine::debit(account("6100")?, dec!(2500), usd.clone())
                    .with_cost_center(ops.id),
                NewJournalLine::credit(account("1000")?, dec!(2500), usd.clone()),
            ],
        ),
        NewJournalEntry::manual(
            today,
            "Invoice 1001",
            vec![
                NewJournalLine::debit(account("1100")?, dec!(12000), usd.clone()),
                NewJournalLine::credit(account("4000")?, dec!(10000), usd.clone()),
                NewJournalLine::credit(account("2100")?, dec!(2000), usd.clone()),
            ],
        )
        .with_source(SourceType::Invoice)
        .with_reference("INV-1001"),
    ];

    for input in entries {
        let entry = engine.create_and_post(&tenant, actor, input).await?;
        info!(entry_number = entry.entry_number, description = %entry.description, "Seeded entry");
    }

    let mistake = engine
        .create_and_post(
            &tenant,
            actor,
            NewJournalEntry::manual(
                today,
                "Duplicate rent",
                vec![
                    NewJournalLine::debit(account("6100")?, dec!(2500), usd.clone()),
                    NewJournalLine::credit(account("1000")?, dec!(2500), usd.clone()),
                ],
            ),
        )
        .await?;
    engine
        .void_entry(&tenant, mistake.id, actor, "Booked twice")
        .await?;

    engine
        .create_entry(
            &tenant,
            actor,
            NewJournalEntry::manual(
                today,
                "Pending supplier bill",
                vec![
                    NewJournalLine::debit(account("5000")?, dec!(800), usd.clone()),
                    NewJournalLine::credit(account("2000")?, dec!(800), usd),
                ],
            ),
        )
        .await?;

    let trial = statements.trial_balance(&tenant, today).await?;
    info!(
        tenant_id = %tenant.tenant_id(),
        schema = %tenant.schema_name(),
        total_debit = %trial.totals.total_debit,
        total_credit = %trial.totals.total_credit,
        balanced = trial.totals.is_balanced,
        "Seeding complete"
    );

    Ok(())
}
