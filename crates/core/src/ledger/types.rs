//! Ledger enums and aggregate figures shared by the engine and reports.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a journal entry.
///
/// `Draft -> Posted -> Void` is the only path. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    /// Entry is being prepared and can be edited or discarded.
    Draft,
    /// Entry is in the books (immutable).
    Posted,
    /// Entry was cancelled by a reversal (immutable).
    Void,
}

impl EntryStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Void => "VOID",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "POSTED" => Some(Self::Posted),
            "VOID" => Some(Self::Void),
            _ => None,
        }
    }

    /// Returns true if `next` is reachable in one step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Draft, Self::Posted) | (Self::Posted, Self::Void))
    }

    /// Returns true if the entry's header and lines may still change.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if the entry is frozen.
    #[must_use]
    pub const fn is_immutable(self) -> bool {
        matches!(self, Self::Posted | Self::Void)
    }

    /// Posted and voided entries both count toward balances; a voided
    /// entry is cancelled by its posted reversal, not by exclusion.
    #[must_use]
    pub const fn contributes_to_balances(self) -> bool {
        self.is_immutable()
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Originating subsystem of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// Hand-keyed journal.
    Manual,
    /// Sales invoice.
    Invoice,
    /// Incoming or outgoing payment.
    Payment,
    /// Payroll run.
    Payroll,
    /// Bank feed or reconciliation.
    Banking,
    /// Period-end adjustment.
    Adjustment,
    /// Opening balances.
    OpeningBalance,
}

impl SourceType {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Invoice => "INVOICE",
            Self::Payment => "PAYMENT",
            Self::Payroll => "PAYROLL",
            Self::Banking => "BANKING",
            Self::Adjustment => "ADJUSTMENT",
            Self::OpeningBalance => "OPENING_BALANCE",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MANUAL" => Some(Self::Manual),
            "INVOICE" => Some(Self::Invoice),
            "PAYMENT" => Some(Self::Payment),
            "PAYROLL" => Some(Self::Payroll),
            "BANKING" => Some(Self::Banking),
            "ADJUSTMENT" => Some(Self::Adjustment),
            "OPENING_BALANCE" => Some(Self::OpeningBalance),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Debit and credit totals of an entry, in both currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of transaction-currency debits.
    pub debit: Decimal,
    /// Sum of transaction-currency credits.
    pub credit: Decimal,
    /// Sum of base-currency debits.
    pub base_debit: Decimal,
    /// Sum of base-currency credits.
    pub base_credit: Decimal,
}

impl EntryTotals {
    /// Both currency views balance.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit && self.base_debit == self.base_credit
    }
}
