//! Property-based tests for journal line validation.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AMOUNT_LIMIT, AccountId, CurrencyCode};

use super::entry::NewJournalLine;
use super::error::LedgerError;
use super::validation::validate_lines;

fn usd() -> CurrencyCode {
    CurrencyCode::parse("USD").unwrap()
}

/// Strategy to generate a valid positive amount (> 0).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    // 0.01 to 1,000,000.00
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Debit amounts split into credit lines that sum exactly.
fn balanced_lines() -> impl Strategy<Value = Vec<NewJournalLine>> {
    prop::collection::vec(positive_amount(), 1..6).prop_flat_map(|debits| {
        let total: Decimal = debits.iter().copied().sum();
        (Just(debits), 1usize..5).prop_map(move |(debits, credit_count)| {
            let mut lines: Vec<_> = debits
                .iter()
                .map(|amount| NewJournalLine::debit(AccountId::new(), *amount, usd()))
                .collect();

            // Split the total into equal-ish cents, the last line takes the remainder.
            let count = Decimal::from(credit_count);
            let share = (total / count).round_dp(2);
            let mut remaining = total;
            for _ in 1..credit_count {
                if share > Decimal::ZERO && share < remaining {
                    lines.push(NewJournalLine::credit(AccountId::new(), share, usd()));
                    remaining -= share;
                }
            }
            lines.push(NewJournalLine::credit(AccountId::new(), remaining, usd()));
            lines
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* set of lines whose debits equal credits, validation passes
    /// and reports matching totals.
    #[test]
    fn prop_balanced_lines_accepted(lines in balanced_lines()) {
        let totals = validate_lines(&lines, &usd());
        prop_assert!(totals.is_ok(), "balanced lines rejected: {:?}", totals);
        let totals = totals.unwrap_or_default();
        prop_assert_eq!(totals.debit, totals.credit);
        prop_assert_eq!(totals.base_debit, totals.base_credit);
    }

    /// *For any* balanced set, nudging one credit by a cent makes it unbalanced.
    #[test]
    fn prop_perturbed_lines_rejected(lines in balanced_lines(), extra in positive_amount()) {
        let mut lines = lines;
        if let Some(last) = lines.last_mut() {
            last.credit_amount += extra;
            last.base_credit += extra;
        }
        let result = validate_lines(&lines, &usd());
        prop_assert!(
            matches!(result, Err(LedgerError::UnbalancedEntry { .. })),
            "expected unbalanced, got {:?}",
            result
        );
    }

    /// *For any* line with both sides or neither side set, validation fails
    /// with the line's position.
    #[test]
    fn prop_two_sided_line_rejected(amount in positive_amount(), both in any::<bool>()) {
        let mut bad = NewJournalLine::debit(AccountId::new(), amount, usd());
        if both {
            bad.credit_amount = amount;
            bad.base_credit = amount;
        } else {
            bad.debit_amount = Decimal::ZERO;
            bad.base_debit = Decimal::ZERO;
        }
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), amount, usd()),
            NewJournalLine::credit(AccountId::new(), amount, usd()),
            bad,
        ];
        let result = validate_lines(&lines, &usd());
        prop_assert!(
            matches!(result, Err(LedgerError::MalformedLine { line: 3, .. })),
            "expected malformed line 3, got {:?}",
            result
        );
    }

    /// *For any* single line, validation rejects the entry for its size.
    #[test]
    fn prop_single_line_rejected(amount in positive_amount()) {
        let lines = vec![NewJournalLine::debit(AccountId::new(), amount, usd())];
        let result = validate_lines(&lines, &usd());
        prop_assert!(
            matches!(result, Err(LedgerError::InsufficientLines { count: 1 })),
            "expected insufficient lines, got {:?}",
            result
        );
    }

    /// *For any* balanced pair carrying a fifth decimal place, validation
    /// rejects the first line.
    #[test]
    fn prop_excess_precision_rejected(
        amount in positive_amount(),
        digit in 1i64..10,
    ) {
        let amount = amount + Decimal::new(digit, 5);
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), amount, usd()),
            NewJournalLine::credit(AccountId::new(), amount, usd()),
        ];
        let result = validate_lines(&lines, &usd());
        prop_assert!(
            matches!(result, Err(LedgerError::MalformedLine { line: 1, .. })),
            "expected malformed line 1, got {:?}",
            result
        );
    }

    /// *For any* amount at or above the column limit, validation fails
    /// instead of summing it.
    #[test]
    fn prop_oversized_amount_rejected(excess in 0i64..i64::MAX) {
        let amount = AMOUNT_LIMIT + Decimal::from(excess);
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), amount, usd()),
            NewJournalLine::debit(AccountId::new(), amount, usd()),
            NewJournalLine::credit(AccountId::new(), amount, usd()),
        ];
        let result = validate_lines(&lines, &usd());
        prop_assert!(
            matches!(result, Err(LedgerError::MalformedLine { line: 1, .. })),
            "expected malformed line 1, got {:?}",
            result
        );
    }
}
