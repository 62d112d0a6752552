//! Property-based tests for the posting engine.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::TenantContext;
use tally_shared::types::{AccountId, ActorId, CurrencyCode, TenantId};

use super::balance::{AccountBalance, BalanceCalculator};
use super::engine::PostingEngine;
use super::entry::{NewJournalEntry, NewJournalLine};
use super::types::EntryStatus;
use crate::chart::AccountRegistry;
use crate::store::InMemoryLedgerStore;

const ACCOUNTS: usize = 6;

/// A balanced entry: one debit split over several lines, one credit.
#[derive(Debug, Clone)]
struct Draft {
    debits: Vec<(usize, i64)>,
    credit: usize,
    day: u32,
}

fn draft() -> impl Strategy<Value = Draft> {
    (
        prop::collection::vec((0..ACCOUNTS, 1i64..1_000_000), 1..4),
        0..ACCOUNTS,
        0u32..60,
    )
        .prop_map(|(debits, credit, day)| Draft {
            debits,
            credit,
            day,
        })
}

struct Ledger {
    engine: PostingEngine<InMemoryLedgerStore>,
    balances: BalanceCalculator<InMemoryLedgerStore>,
    tenant: TenantContext,
    actor: ActorId,
    accounts: Vec<AccountId>,
}

impl Ledger {
    async fn new() -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let tenant = TenantContext::new(TenantId::new(), "tenant_props", usd()).unwrap();
        let registry = AccountRegistry::new(Arc::clone(&store));
        let accounts = registry
            .seed_default_chart(&tenant)
            .await
            .unwrap()
            .into_iter()
            .take(ACCOUNTS)
            .map(|a| a.id)
            .collect();

        Self {
            engine: PostingEngine::new(Arc::clone(&store)),
            balances: BalanceCalculator::new(store),
            tenant,
            actor: ActorId::new(),
            accounts,
        }
    }

    fn entry(&self, draft: &Draft) -> NewJournalEntry {
        let mut lines: Vec<_> = draft
            .debits
            .iter()
            .map(|&(account, cents)| {
                NewJournalLine::debit(self.accounts[account], Decimal::new(cents, 2), usd())
            })
            .collect();
        let total: i64 = draft.debits.iter().map(|&(_, cents)| cents).sum();
        lines.push(NewJournalLine::credit(
            self.accounts[draft.credit],
            Decimal::new(total, 2),
            usd(),
        ));
        let date = origin() + chrono::Days::new(u64::from(draft.day));
        NewJournalEntry::manual(date, "Generated", lines)
    }

    async fn snapshot(&self) -> Vec<AccountBalance> {
        self.balances
            .all_balances(&self.tenant, origin() + chrono::Days::new(365))
            .await
            .unwrap()
    }

    /// Signed balance per account; gross totals keep growing across voids.
    async fn signed_balances(&self) -> Vec<(AccountId, Decimal)> {
        self.snapshot()
            .await
            .into_iter()
            .map(|b| (b.account_id, b.balance))
            .collect()
    }
}

fn usd() -> CurrencyCode {
    CurrencyCode::parse("USD").unwrap()
}

fn origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Posting then voiding an entry leaves every balance where it was.
    #[test]
    fn prop_void_restores_balances(
        history in prop::collection::vec(draft(), 0..8),
        target in draft(),
    ) {
        runtime().block_on(async {
            let ledger = Ledger::new().await;
            for d in &history {
                ledger
                    .engine
                    .create_and_post(&ledger.tenant, ledger.actor, ledger.entry(d))
                    .await
                    .unwrap();
            }
            let before = ledger.signed_balances().await;

            let posted = ledger
                .engine
                .create_and_post(&ledger.tenant, ledger.actor, ledger.entry(&target))
                .await
                .unwrap();
            let reversal = ledger
                .engine
                .void_entry(&ledger.tenant, posted.id, ledger.actor, "property")
                .await
                .unwrap();

            prop_assert_eq!(ledger.signed_balances().await, before);
            prop_assert_eq!(reversal.lines.len(), posted.lines.len());
            prop_assert_eq!(reversal.totals().base_debit, posted.totals().base_credit);
            Ok(())
        })?;
    }

    /// Without failures, numbers are 1..=n in posting order, voids included.
    #[test]
    fn prop_numbers_are_sequential(
        drafts in prop::collection::vec((draft(), any::<bool>()), 1..12),
    ) {
        runtime().block_on(async {
            let ledger = Ledger::new().await;
            let mut expected = 0i64;

            for (d, void) in &drafts {
                let posted = ledger
                    .engine
                    .create_and_post(&ledger.tenant, ledger.actor, ledger.entry(d))
                    .await
                    .unwrap();
                expected += 1;
                prop_assert_eq!(posted.entry_number, Some(expected));

                if *void {
                    let reversal = ledger
                        .engine
                        .void_entry(&ledger.tenant, posted.id, ledger.actor, "property")
                        .await
                        .unwrap();
                    expected += 1;
                    prop_assert_eq!(reversal.entry_number, Some(expected));
                    let original = ledger
                        .engine
                        .get_entry(&ledger.tenant, posted.id)
                        .await
                        .unwrap();
                    prop_assert_eq!(original.status, EntryStatus::Void);
                    prop_assert_eq!(original.entry_number, posted.entry_number);
                }
            }

            let trial: Decimal = ledger
                .snapshot()
                .await
                .iter()
                .map(AccountBalance::net_debit)
                .sum();
            prop_assert_eq!(trial, Decimal::ZERO);
            Ok(())
        })?;
    }
}
