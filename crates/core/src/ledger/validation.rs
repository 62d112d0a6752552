//! Business rule validation for journal lines.
//!
//! Structural rules only: line count, per-line amount shape and the
//! double-entry balance. Whether referenced accounts and cost centers exist
//! is checked by the engine against the store.

use rust_decimal::Decimal;
use tally_shared::types::{AMOUNT_LIMIT, BASE_AMOUNT_SCALE, CurrencyCode};

use super::entry::{LineAmounts, totals_of};
use super::error::LedgerError;
use super::types::EntryTotals;

/// Minimum number of lines in a journal entry.
pub const MIN_LINES: usize = 2;

/// Validates a single line.
///
/// `position` is 1-based and only used in the error.
///
/// # Errors
///
/// Returns [`LedgerError::MalformedLine`] describing the first broken rule.
pub fn validate_line<L: LineAmounts>(
    position: usize,
    line: &L,
    base_currency: &CurrencyCode,
) -> Result<(), LedgerError> {
    let malformed = |reason| LedgerError::MalformedLine {
        line: position,
        reason,
    };

    let (debit, credit) = (line.debit_amount(), line.credit_amount());
    let (base_debit, base_credit) = (line.base_debit(), line.base_credit());

    if [debit, credit, base_debit, base_credit]
        .iter()
        .any(|amount| *amount < Decimal::ZERO)
    {
        return Err(malformed("amounts must not be negative"));
    }
    if [debit, credit, base_debit, base_credit]
        .iter()
        .any(|amount| *amount >= AMOUNT_LIMIT)
    {
        return Err(malformed("amount exceeds the supported range"));
    }
    if [debit, credit, base_debit, base_credit]
        .iter()
        .any(|amount| amount.normalize().scale() > BASE_AMOUNT_SCALE)
    {
        return Err(malformed("amounts allow at most 4 decimal places"));
    }

    let is_debit = debit > Decimal::ZERO;
    let is_credit = credit > Decimal::ZERO;
    if is_debit == is_credit {
        return Err(malformed("exactly one of debit or credit must be positive"));
    }

    let base_on_same_side = if is_debit {
        base_debit > Decimal::ZERO && base_credit.is_zero()
    } else {
        base_credit > Decimal::ZERO && base_debit.is_zero()
    };
    if !base_on_same_side {
        return Err(malformed(
            "base amount must be positive and on the same side as the amount",
        ));
    }

    if line.currency() == base_currency && (base_debit != debit || base_credit != credit) {
        return Err(malformed(
            "base amount must equal the amount for base-currency lines",
        ));
    }

    Ok(())
}

/// Validates a full set of lines and returns their totals.
///
/// # Errors
///
/// - [`LedgerError::InsufficientLines`] for fewer than [`MIN_LINES`] lines
/// - [`LedgerError::MalformedLine`] for the first invalid line
/// - [`LedgerError::UnbalancedEntry`] if either currency view does not balance
pub fn validate_lines<L: LineAmounts>(
    lines: &[L],
    base_currency: &CurrencyCode,
) -> Result<EntryTotals, LedgerError> {
    if lines.len() < MIN_LINES {
        return Err(LedgerError::InsufficientLines { count: lines.len() });
    }

    for (index, line) in lines.iter().enumerate() {
        validate_line(index + 1, line, base_currency)?;
    }

    let totals = totals_of(lines);
    if !totals.is_balanced() {
        return Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
            base_debit: totals.base_debit,
            base_credit: totals.base_credit,
        });
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entry::NewJournalLine;
    use rust_decimal_macros::dec;
    use tally_shared::types::AccountId;

    fn usd() -> CurrencyCode {
        CurrencyCode::parse("USD").unwrap()
    }

    fn eur() -> CurrencyCode {
        CurrencyCode::parse("EUR").unwrap()
    }

    #[test]
    fn test_balanced_lines() {
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), dec!(100), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(60), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(40), usd()),
        ];
        let totals = validate_lines(&lines, &usd()).unwrap();
        assert_eq!(totals.debit, dec!(100));
        assert_eq!(totals.base_credit, dec!(100));
    }

    #[test]
    fn test_single_line_rejected() {
        let lines = vec![NewJournalLine::debit(AccountId::new(), dec!(100), usd())];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::InsufficientLines { count: 1 })
        ));
        let none: Vec<NewJournalLine> = Vec::new();
        assert!(matches!(
            validate_lines(&none, &usd()),
            Err(LedgerError::InsufficientLines { count: 0 })
        ));
    }

    #[test]
    fn test_unbalanced_lines() {
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), dec!(100), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(99.99), usd()),
        ];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::UnbalancedEntry { debit, credit, .. })
                if debit == dec!(100) && credit == dec!(99.99)
        ));
    }

    #[test]
    fn test_base_view_must_balance_too() {
        let lines = vec![
            NewJournalLine::debit_foreign(AccountId::new(), dec!(100), eur(), dec!(110)),
            NewJournalLine::credit_foreign(AccountId::new(), dec!(100), eur(), dec!(109)),
        ];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::UnbalancedEntry { .. })
        ));
    }

    #[test]
    fn test_both_sides_on_one_line_rejected() {
        let mut line = NewJournalLine::debit(AccountId::new(), dec!(100), usd());
        line.credit_amount = dec!(100);
        line.base_credit = dec!(100);
        let lines = vec![line, NewJournalLine::credit(AccountId::new(), dec!(0.01), usd())];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn test_zero_line_rejected() {
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), dec!(100), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(100), usd()),
            NewJournalLine::debit(AccountId::new(), Decimal::ZERO, usd()),
        ];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::MalformedLine { line: 3, .. })
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let line = NewJournalLine::debit(AccountId::new(), dec!(-5), usd());
        assert!(matches!(
            validate_line(1, &line, &usd()),
            Err(LedgerError::MalformedLine {
                reason: "amounts must not be negative",
                ..
            })
        ));
    }

    #[test]
    fn test_excess_precision_rejected() {
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), dec!(1.00004), usd()),
            NewJournalLine::debit(AccountId::new(), dec!(1.00004), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(2.00008), usd()),
        ];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::MalformedLine {
                line: 1,
                reason: "amounts allow at most 4 decimal places",
            })
        ));

        // Trailing zeros are not extra precision.
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), dec!(1.500000), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(1.5), usd()),
        ];
        assert!(validate_lines(&lines, &usd()).is_ok());
    }

    #[test]
    fn test_foreign_base_precision_checked() {
        let line = NewJournalLine::debit_foreign(AccountId::new(), dec!(10), eur(), dec!(11.00001));
        assert!(validate_line(1, &line, &usd()).is_err());
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), dec!(1_000_000_000_000_000), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(1_000_000_000_000_000), usd()),
        ];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::MalformedLine {
                line: 1,
                reason: "amount exceeds the supported range",
            })
        ));

        let lines = vec![
            NewJournalLine::debit(AccountId::new(), dec!(999_999_999_999_999.9999), usd()),
            NewJournalLine::credit(AccountId::new(), dec!(999_999_999_999_999.9999), usd()),
        ];
        assert!(validate_lines(&lines, &usd()).is_ok());
    }

    #[test]
    fn test_huge_amounts_do_not_overflow_totals() {
        let huge = Decimal::MAX - Decimal::ONE;
        let lines = vec![
            NewJournalLine::debit(AccountId::new(), huge, usd()),
            NewJournalLine::debit(AccountId::new(), huge, usd()),
            NewJournalLine::credit(AccountId::new(), dec!(1), usd()),
        ];
        assert!(matches!(
            validate_lines(&lines, &usd()),
            Err(LedgerError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn test_base_on_wrong_side_rejected() {
        let mut line = NewJournalLine::debit_foreign(AccountId::new(), dec!(10), eur(), dec!(11));
        line.base_debit = Decimal::ZERO;
        line.base_credit = dec!(11);
        assert!(validate_line(1, &line, &usd()).is_err());
    }

    #[test]
    fn test_base_currency_line_must_match_amount() {
        let line = NewJournalLine::debit_foreign(AccountId::new(), dec!(10), usd(), dec!(11));
        assert!(validate_line(1, &line, &usd()).is_err());
        let line = NewJournalLine::debit_foreign(AccountId::new(), dec!(10), eur(), dec!(11));
        assert!(validate_line(1, &line, &usd()).is_ok());
    }
}
