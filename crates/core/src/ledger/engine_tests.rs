//! Posting engine lifecycle tests.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_shared::TenantContext;
use tally_shared::types::{
    AccountId, ActorId, CostCenterId, CurrencyCode, JournalEntryId, PageRequest, TenantId,
};

use super::balance::BalanceCalculator;
use super::engine::PostingEngine;
use super::entry::{JournalEntry, NewJournalEntry, NewJournalLine};
use super::error::{ErrorKind, LedgerError};
use super::types::{EntryStatus, SourceType};
use crate::chart::AccountRegistry;
use crate::chart::types::{AccountType, NewAccount};
use crate::store::{EntryFilter, InMemoryLedgerStore};

struct Fixture {
    store: Arc<InMemoryLedgerStore>,
    registry: AccountRegistry<InMemoryLedgerStore>,
    engine: PostingEngine<InMemoryLedgerStore>,
    balances: BalanceCalculator<InMemoryLedgerStore>,
    tenant: TenantContext,
    actor: ActorId,
    cash: AccountId,
    capital: AccountId,
    sales: AccountId,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryLedgerStore::new());
    let registry = AccountRegistry::new(Arc::clone(&store));
    let tenant = tenant("tenant_acme");

    let mut ids = Vec::new();
    for (code, name, account_type) in [
        ("1000", "Cash", AccountType::Asset),
        ("3000", "Share Capital", AccountType::Equity),
        ("4000", "Sales", AccountType::Revenue),
    ] {
        let account = registry
            .create_account(&tenant, NewAccount::new(code, name, account_type))
            .await
            .unwrap();
        ids.push(account.id);
    }

    Fixture {
        engine: PostingEngine::new(Arc::clone(&store)),
        balances: BalanceCalculator::new(Arc::clone(&store)),
        registry,
        store,
        tenant,
        actor: ActorId::new(),
        cash: ids[0],
        capital: ids[1],
        sales: ids[2],
    }
}

fn tenant(schema: &str) -> TenantContext {
    TenantContext::new(TenantId::new(), schema, usd()).unwrap()
}

fn usd() -> CurrencyCode {
    CurrencyCode::parse("USD").unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn transfer(
    on: NaiveDate,
    debit: AccountId,
    credit: AccountId,
    amount: Decimal,
) -> NewJournalEntry {
    NewJournalEntry::manual(
        on,
        "Transfer",
        vec![
            NewJournalLine::debit(debit, amount, usd()),
            NewJournalLine::credit(credit, amount, usd()),
        ],
    )
}

impl Fixture {
    fn capital_injection(&self, amount: Decimal) -> NewJournalEntry {
        transfer(date(2025, 1, 1), self.cash, self.capital, amount)
    }

    async fn posted(&self, amount: Decimal) -> JournalEntry {
        self.engine
            .create_and_post(&self.tenant, self.actor, self.capital_injection(amount))
            .await
            .unwrap()
    }

    async fn balance(&self, account_id: AccountId) -> Decimal {
        self.balances
            .account_balance(&self.tenant, account_id, date(2025, 1, 1))
            .await
            .unwrap()
            .balance
    }

    async fn entry(&self, id: JournalEntryId) -> JournalEntry {
        self.engine.get_entry(&self.tenant, id).await.unwrap()
    }
}

#[tokio::test]
async fn test_draft_post_void_lifecycle() {
    let fx = fixture().await;

    let draft = fx
        .engine
        .create_entry(&fx.tenant, fx.actor, fx.capital_injection(dec!(1000)))
        .await
        .unwrap();
    assert_eq!(draft.status, EntryStatus::Draft);
    assert_eq!(draft.entry_number, None);
    assert_eq!(fx.balance(fx.cash).await, Decimal::ZERO);

    let posted = fx.engine.post_entry(&fx.tenant, draft.id, fx.actor).await.unwrap();
    assert_eq!(posted.status, EntryStatus::Posted);
    assert_eq!(posted.entry_number, Some(1));
    assert_eq!(posted.posted_by, Some(fx.actor));
    assert_eq!(fx.balance(fx.cash).await, dec!(1000));
    assert_eq!(fx.balance(fx.capital).await, dec!(1000));

    let reversal = fx
        .engine
        .void_entry(&fx.tenant, draft.id, fx.actor, "  mistake ")
        .await
        .unwrap();
    assert_eq!(reversal.status, EntryStatus::Posted);
    assert_eq!(reversal.entry_number, Some(2));
    assert_eq!(reversal.reversal_of_entry_id, Some(draft.id));
    assert_eq!(reversal.entry_date, date(2025, 1, 1));
    assert_eq!(reversal.description, "Reversal of entry #1: mistake");
    assert_eq!(fx.balance(fx.cash).await, Decimal::ZERO);
    assert_eq!(fx.balance(fx.capital).await, Decimal::ZERO);

    let original = fx.entry(draft.id).await;
    assert_eq!(original.status, EntryStatus::Void);
    assert_eq!(original.entry_number, Some(1));
    assert_eq!(original.void_reason.as_deref(), Some("mistake"));
    assert_eq!(original.voided_by, Some(fx.actor));
    assert_eq!(original.lines, posted.lines);
}

#[tokio::test]
async fn test_post_twice_fails() {
    let fx = fixture().await;
    let entry = fx.posted(dec!(10)).await;

    let err = fx.engine.post_entry(&fx.tenant, entry.id, fx.actor).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidStateTransition {
            from: EntryStatus::Posted,
            to: EntryStatus::Posted,
            ..
        }
    ));
    assert_eq!(fx.entry(entry.id).await.entry_number, Some(1));
}

#[tokio::test]
async fn test_void_twice_fails() {
    let fx = fixture().await;
    let entry = fx.posted(dec!(10)).await;
    fx.engine.void_entry(&fx.tenant, entry.id, fx.actor, "first").await.unwrap();

    let err = fx
        .engine
        .void_entry(&fx.tenant, entry.id, fx.actor, "second")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyVoided(id) if id == entry.id));
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let reversals = fx
        .engine
        .list_entries(
            &fx.tenant,
            &EntryFilter {
                reversal_of: Some(entry.id),
                ..EntryFilter::default()
            },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(reversals.meta.total, 1);
}

#[tokio::test]
async fn test_void_draft_fails() {
    let fx = fixture().await;
    let draft = fx
        .engine
        .create_entry(&fx.tenant, fx.actor, fx.capital_injection(dec!(10)))
        .await
        .unwrap();

    let err = fx
        .engine
        .void_entry(&fx.tenant, draft.id, fx.actor, "nope")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidStateTransition {
            from: EntryStatus::Draft,
            to: EntryStatus::Void,
            ..
        }
    ));
}

#[tokio::test]
async fn test_void_requires_reason() {
    let fx = fixture().await;
    let entry = fx.posted(dec!(10)).await;

    let err = fx
        .engine
        .void_entry(&fx.tenant, entry.id, fx.actor, "   ")
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::VoidReasonRequired);
    assert_eq!(fx.entry(entry.id).await.status, EntryStatus::Posted);
}

#[tokio::test]
async fn test_reversal_can_be_voided() {
    let fx = fixture().await;
    let entry = fx.posted(dec!(250)).await;
    let reversal = fx
        .engine
        .void_entry(&fx.tenant, entry.id, fx.actor, "wrong period")
        .await
        .unwrap();

    let counter = fx
        .engine
        .void_entry(&fx.tenant, reversal.id, fx.actor, "was right after all")
        .await
        .unwrap();

    assert_eq!(counter.reversal_of_entry_id, Some(reversal.id));
    assert_eq!(counter.entry_number, Some(3));
    assert_eq!(fx.balance(fx.cash).await, dec!(250));
    assert_eq!(fx.entry(reversal.id).await.status, EntryStatus::Void);
}

#[tokio::test]
async fn test_unknown_entry() {
    let fx = fixture().await;
    let missing = JournalEntryId::new();

    let err = fx.engine.post_entry(&fx.tenant, missing, fx.actor).await.unwrap_err();
    assert_eq!(err, LedgerError::EntryNotFound(missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(fx.engine.get_entry(&fx.tenant, missing).await.is_err());
}

#[tokio::test]
async fn test_unbalanced_entry_is_not_stored() {
    let fx = fixture().await;
    let input = NewJournalEntry::manual(
        date(2025, 1, 1),
        "Lopsided",
        vec![
            NewJournalLine::debit(fx.cash, dec!(100), usd()),
            NewJournalLine::credit(fx.capital, dec!(90), usd()),
        ],
    );

    let err = fx.engine.create_entry(&fx.tenant, fx.actor, input).await.unwrap_err();
    assert!(matches!(err, LedgerError::UnbalancedEntry { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let all = fx
        .engine
        .list_entries(&fx.tenant, &EntryFilter::default(), &PageRequest::default())
        .await
        .unwrap();
    assert!(all.data.is_empty());
}

#[tokio::test]
async fn test_unstorable_amounts_are_not_stored() {
    let fx = fixture().await;
    let sub_cent = NewJournalEntry::manual(
        date(2025, 1, 1),
        "Sub-cent split",
        vec![
            NewJournalLine::debit(fx.cash, dec!(1.00004), usd()),
            NewJournalLine::debit(fx.cash, dec!(1.00004), usd()),
            NewJournalLine::credit(fx.capital, dec!(2.00008), usd()),
        ],
    );
    let err = fx
        .engine
        .create_and_post(&fx.tenant, fx.actor, sub_cent)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MalformedLine { line: 1, .. }));

    let huge = Decimal::MAX - Decimal::ONE;
    let overflowing = NewJournalEntry::manual(
        date(2025, 1, 1),
        "Overflow",
        vec![
            NewJournalLine::debit(fx.cash, huge, usd()),
            NewJournalLine::debit(fx.cash, huge, usd()),
            NewJournalLine::credit(fx.capital, dec!(1), usd()),
        ],
    );
    let err = fx
        .engine
        .create_entry(&fx.tenant, fx.actor, overflowing)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let all = fx
        .engine
        .list_entries(&fx.tenant, &EntryFilter::default(), &PageRequest::default())
        .await
        .unwrap();
    assert!(all.data.is_empty());
    assert_eq!(fx.balance(fx.cash).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_inactive_and_unknown_accounts_rejected() {
    let fx = fixture().await;
    fx.registry.deactivate_account(&fx.tenant, fx.sales).await.unwrap();

    let err = fx
        .engine
        .create_entry(
            &fx.tenant,
            fx.actor,
            transfer(date(2025, 1, 1), fx.cash, fx.sales, dec!(5)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidAccount { account_id, .. } if account_id == fx.sales
    ));

    let stranger = AccountId::new();
    let err = fx
        .engine
        .create_entry(
            &fx.tenant,
            fx.actor,
            transfer(date(2025, 1, 1), stranger, fx.cash, dec!(5)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidAccount { account_id, .. } if account_id == stranger
    ));
}

#[tokio::test]
async fn test_post_rechecks_accounts_but_void_does_not() {
    let fx = fixture().await;
    let draft = fx
        .engine
        .create_entry(
            &fx.tenant,
            fx.actor,
            transfer(date(2025, 1, 1), fx.cash, fx.sales, dec!(40)),
        )
        .await
        .unwrap();
    let posted = fx
        .engine
        .create_and_post(
            &fx.tenant,
            fx.actor,
            transfer(date(2025, 1, 1), fx.cash, fx.sales, dec!(60)),
        )
        .await
        .unwrap();
    fx.registry.deactivate_account(&fx.tenant, fx.sales).await.unwrap();

    let err = fx.engine.post_entry(&fx.tenant, draft.id, fx.actor).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccount { .. }));
    assert_eq!(fx.entry(draft.id).await.status, EntryStatus::Draft);

    fx.engine
        .void_entry(&fx.tenant, posted.id, fx.actor, "customer cancelled")
        .await
        .unwrap();
    assert_eq!(fx.balance(fx.sales).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_cost_centers_must_exist() {
    let fx = fixture().await;
    let center = fx
        .registry
        .create_cost_center(&fx.tenant, "OPS", "Operations")
        .await
        .unwrap();

    let tagged = |cost_center_id: CostCenterId| {
        NewJournalEntry::manual(
            date(2025, 1, 1),
            "Tagged",
            vec![
                NewJournalLine::debit(fx.cash, dec!(5), usd()).with_cost_center(cost_center_id),
                NewJournalLine::credit(fx.capital, dec!(5), usd()),
            ],
        )
    };

    let entry = fx
        .engine
        .create_and_post(&fx.tenant, fx.actor, tagged(center.id))
        .await
        .unwrap();
    assert_eq!(entry.lines[0].cost_center_id, Some(center.id));

    let ghost = CostCenterId::new();
    let err = fx
        .engine
        .create_and_post(&fx.tenant, fx.actor, tagged(ghost))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::InvalidCostCenter(ghost));
}

#[tokio::test]
async fn test_update_and_discard_draft() {
    let fx = fixture().await;
    let draft = fx
        .engine
        .create_entry(&fx.tenant, fx.actor, fx.capital_injection(dec!(10)))
        .await
        .unwrap();

    let updated = fx
        .engine
        .update_draft(
            &fx.tenant,
            draft.id,
            transfer(date(2025, 2, 1), fx.cash, fx.sales, dec!(75))
                .with_reference("R-1")
                .with_source(SourceType::Invoice),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, draft.id);
    assert_eq!(updated.entry_date, date(2025, 2, 1));
    assert_eq!(updated.totals().debit, dec!(75));
    assert_eq!(fx.entry(draft.id).await, updated);

    fx.engine.discard_draft(&fx.tenant, draft.id).await.unwrap();
    assert_eq!(
        fx.engine.get_entry(&fx.tenant, draft.id).await.unwrap_err(),
        LedgerError::EntryNotFound(draft.id)
    );
}

#[tokio::test]
async fn test_posted_entries_are_immutable() {
    let fx = fixture().await;
    let entry = fx.posted(dec!(10)).await;

    let err = fx
        .engine
        .update_draft(&fx.tenant, entry.id, fx.capital_injection(dec!(20)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::EntryImmutable {
            status: EntryStatus::Posted,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let err = fx.engine.discard_draft(&fx.tenant, entry.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::EntryImmutable { .. }));
    assert_eq!(fx.entry(entry.id).await, entry);
}

#[tokio::test]
async fn test_number_conflict_is_retried_once() {
    let fx = fixture().await;
    fx.posted(dec!(1)).await;
    fx.posted(dec!(2)).await;
    fx.store.rewind_sequence(fx.tenant.tenant_id(), 1).await;

    let entry = fx.posted(dec!(3)).await;
    assert_eq!(entry.entry_number, Some(3));
}

#[tokio::test]
async fn test_number_conflict_gives_up_after_retry() {
    let fx = fixture().await;
    for amount in [dec!(1), dec!(2), dec!(3)] {
        fx.posted(amount).await;
    }
    fx.store.rewind_sequence(fx.tenant.tenant_id(), 0).await;

    let err = fx
        .engine
        .create_and_post(&fx.tenant, fx.actor, fx.capital_injection(dec!(4)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NumberAssignmentConflict { .. }));
    assert!(err.is_retryable());

    // Nothing of the failed unit of work survives.
    let all = fx
        .engine
        .list_entries(&fx.tenant, &EntryFilter::default(), &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.meta.total, 3);
    assert_eq!(fx.balance(fx.cash).await, dec!(6));
}

#[tokio::test]
async fn test_failed_commit_rolls_back_void() {
    let fx = fixture().await;
    let entry = fx.posted(dec!(100)).await;

    fx.store.set_fail_commits(true);
    let err = fx
        .engine
        .void_entry(&fx.tenant, entry.id, fx.actor, "oops")
        .await
        .unwrap_err();
    fx.store.set_fail_commits(false);

    assert!(matches!(err, LedgerError::Persistence(_)));
    assert!(!err.is_retryable());
    assert_eq!(fx.entry(entry.id).await.status, EntryStatus::Posted);
    assert_eq!(fx.balance(fx.cash).await, dec!(100));

    let reversal = fx
        .engine
        .void_entry(&fx.tenant, entry.id, fx.actor, "oops")
        .await
        .unwrap();
    assert_eq!(reversal.entry_number, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts_get_distinct_numbers() {
    let fx = fixture().await;
    let mut drafts = Vec::new();
    for i in 1..=20 {
        let draft = fx
            .engine
            .create_entry(&fx.tenant, fx.actor, fx.capital_injection(Decimal::from(i)))
            .await
            .unwrap();
        drafts.push(draft.id);
    }

    let handles: Vec<_> = drafts
        .into_iter()
        .map(|id| {
            let engine = fx.engine.clone();
            let tenant = fx.tenant.clone();
            let actor = fx.actor;
            tokio::spawn(async move { engine.post_entry(&tenant, id, actor).await })
        })
        .collect();

    let mut numbers: Vec<i64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().entry_number.unwrap())
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=20).collect::<Vec<_>>());
    assert_eq!(fx.balance(fx.cash).await, dec!(210));
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let fx = fixture().await;
    let entry = fx.posted(dec!(10)).await;

    let other = tenant("tenant_globex");
    let err = fx.engine.get_entry(&other, entry.id).await.unwrap_err();
    assert_eq!(err, LedgerError::EntryNotFound(entry.id));

    // Accounts of one tenant are unknown to another.
    let err = fx
        .engine
        .create_entry(&other, fx.actor, fx.capital_injection(dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccount { .. }));

    let cash = fx
        .registry
        .create_account(&other, NewAccount::new("1000", "Cash", AccountType::Asset))
        .await
        .unwrap();
    let equity = fx
        .registry
        .create_account(&other, NewAccount::new("3000", "Capital", AccountType::Equity))
        .await
        .unwrap();
    let first = fx
        .engine
        .create_and_post(&other, fx.actor, transfer(date(2025, 1, 1), cash.id, equity.id, dec!(1)))
        .await
        .unwrap();
    assert_eq!(first.entry_number, Some(1));
}

#[tokio::test]
async fn test_list_entries_filters() {
    let fx = fixture().await;
    let early = fx
        .engine
        .create_and_post(
            &fx.tenant,
            fx.actor,
            transfer(date(2025, 1, 5), fx.cash, fx.sales, dec!(10))
                .with_source(SourceType::Invoice),
        )
        .await
        .unwrap();
    let late = fx
        .engine
        .create_and_post(
            &fx.tenant,
            fx.actor,
            transfer(date(2025, 3, 5), fx.cash, fx.capital, dec!(20)),
        )
        .await
        .unwrap();
    fx.engine
        .create_entry(
            &fx.tenant,
            fx.actor,
            transfer(date(2025, 2, 5), fx.cash, fx.capital, dec!(30)),
        )
        .await
        .unwrap();
    let reversal = fx
        .engine
        .void_entry(&fx.tenant, early.id, fx.actor, "test")
        .await
        .unwrap();

    let list = |filter: EntryFilter| {
        let engine = fx.engine.clone();
        let tenant = fx.tenant.clone();
        async move {
            engine
                .list_entries(&tenant, &filter, &PageRequest::default())
                .await
                .unwrap()
                .data
                .into_iter()
                .map(|e| e.id)
                .collect::<Vec<_>>()
        }
    };

    let all = list(EntryFilter::default()).await;
    assert_eq!(all.len(), 4);
    // Date then number: the reversal shares the original's date.
    assert_eq!(&all[..2], &[early.id, reversal.id]);
    assert_eq!(all[3], late.id);

    let drafts = list(EntryFilter {
        status: Some(EntryStatus::Draft),
        ..EntryFilter::default()
    })
    .await;
    assert_eq!(drafts.len(), 1);

    let on_sales = list(EntryFilter {
        account_id: Some(fx.sales),
        ..EntryFilter::default()
    })
    .await;
    assert_eq!(on_sales, vec![early.id, reversal.id]);

    let invoices = list(EntryFilter {
        source_type: Some(SourceType::Invoice),
        ..EntryFilter::default()
    })
    .await;
    assert_eq!(invoices, vec![early.id, reversal.id]);

    let february_on = list(EntryFilter {
        date_from: Some(date(2025, 2, 1)),
        date_to: Some(date(2025, 12, 31)),
        ..EntryFilter::default()
    })
    .await;
    assert_eq!(february_on.len(), 2);

    let reversals = list(EntryFilter {
        reversal_of: Some(early.id),
        ..EntryFilter::default()
    })
    .await;
    assert_eq!(reversals, vec![reversal.id]);

    let page = fx
        .engine
        .list_entries(
            &fx.tenant,
            &EntryFilter::default(),
            &PageRequest { page: 2, per_page: 3 },
        )
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.meta.total, 4);
}

#[tokio::test]
async fn test_foreign_currency_balances_in_base() {
    let fx = fixture().await;
    let eur = CurrencyCode::parse("EUR").unwrap();
    let entry = fx
        .engine
        .create_and_post(
            &fx.tenant,
            fx.actor,
            NewJournalEntry::manual(
                date(2025, 1, 1),
                "EUR sale",
                vec![
                    NewJournalLine::debit_at_rate(fx.cash, dec!(100), eur.clone(), dec!(1.0845)),
                    NewJournalLine::credit_at_rate(fx.sales, dec!(100), eur, dec!(1.0845)),
                ],
            ),
        )
        .await
        .unwrap();

    assert_eq!(entry.totals().base_debit, dec!(108.45));
    assert_eq!(fx.balance(fx.cash).await, dec!(108.45));
    assert_eq!(fx.balance(fx.sales).await, dec!(108.45));
}
