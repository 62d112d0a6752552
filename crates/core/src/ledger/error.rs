//! Ledger error types.
//!
//! Every failure surfaced by the registry, the posting engine, the balance
//! calculator and the statement builder is a [`LedgerError`]. Callers branch
//! on [`LedgerError::kind`] rather than on individual variants.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::AppError;
use tally_shared::types::{AccountId, CostCenterId, JournalEntryId};
use thiserror::Error;

use super::types::EntryStatus;
use crate::store::StoreError;

/// Error categories distinguishable by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input rejected by a business rule.
    Validation,
    /// Referenced record does not exist for the tenant.
    NotFound,
    /// Operation not allowed in the entry's current status.
    InvalidStateTransition,
    /// Lost a race the engine could not resolve internally.
    Concurrency,
    /// Storage backend failure.
    Persistence,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry has fewer than two lines.
    #[error("Journal entry must have at least 2 lines, got {count}")]
    InsufficientLines {
        /// Number of lines supplied.
        count: usize,
    },

    /// Debit and credit totals differ.
    #[error(
        "Journal entry is not balanced. Debit: {debit}, Credit: {credit} \
         (base debit: {base_debit}, base credit: {base_credit})"
    )]
    UnbalancedEntry {
        /// Total transaction-currency debits.
        debit: Decimal,
        /// Total transaction-currency credits.
        credit: Decimal,
        /// Total base-currency debits.
        base_debit: Decimal,
        /// Total base-currency credits.
        base_credit: Decimal,
    },

    /// A single line breaks the amount rules.
    #[error("Line {line} is malformed: {reason}")]
    MalformedLine {
        /// 1-based line position.
        line: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Line references an account that is missing or inactive.
    #[error("Account {account_id} cannot receive postings: {reason}")]
    InvalidAccount {
        /// The referenced account.
        account_id: AccountId,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Line references an unknown cost center.
    #[error("Cost center not found: {0}")]
    InvalidCostCenter(CostCenterId),

    /// Account or cost center code already taken within the tenant.
    #[error("Code '{0}' is already in use")]
    DuplicateCode(String),

    /// Account or cost center code is empty or too long.
    #[error("Invalid code: '{0}'")]
    InvalidCode(String),

    /// Name is empty.
    #[error("Name must not be empty")]
    EmptyName,

    /// Account type string is not one of the five types.
    #[error("Invalid account type: '{0}'")]
    InvalidAccountType(String),

    /// Void requested without a reason.
    #[error("A reason is required to void a journal entry")]
    VoidReasonRequired,

    /// Reporting period ends before it starts.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// Period start.
        start: NaiveDate,
        /// Period end.
        end: NaiveDate,
    },

    /// Account is referenced by journal lines.
    #[error("Account {0} is referenced by journal lines")]
    AccountInUse(AccountId),

    /// System accounts cannot be deleted.
    #[error("Account {0} is a system account and cannot be deleted")]
    SystemAccountProtected(AccountId),

    /// Configured fiscal year start is not a valid month/day.
    #[error("Invalid fiscal year start: month {month}, day {day}")]
    InvalidFiscalYearStart {
        /// Configured month.
        month: u32,
        /// Configured day.
        day: u32,
    },

    // ========== Not Found Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    // ========== State Errors ==========
    /// Status change not permitted by the lifecycle.
    #[error("Journal entry {entry_id} cannot move from {from} to {to}")]
    InvalidStateTransition {
        /// The entry.
        entry_id: JournalEntryId,
        /// Current status.
        from: EntryStatus,
        /// Requested status.
        to: EntryStatus,
    },

    /// Entry has already been voided.
    #[error("Journal entry {0} is already voided")]
    AlreadyVoided(JournalEntryId),

    /// Lines of posted or voided entries are frozen.
    #[error("Journal entry {entry_id} is {status} and cannot be modified")]
    EntryImmutable {
        /// The entry.
        entry_id: JournalEntryId,
        /// Its status.
        status: EntryStatus,
    },

    // ========== Concurrency Errors ==========
    /// Entry number was taken by a concurrent post twice in a row.
    #[error("Could not assign an entry number to {entry_id}, please retry")]
    NumberAssignmentConflict {
        /// The entry being posted.
        entry_id: JournalEntryId,
    },

    // ========== Persistence Errors ==========
    /// Storage backend failure.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl LedgerError {
    /// Returns the category callers branch on.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientLines { .. }
            | Self::UnbalancedEntry { .. }
            | Self::MalformedLine { .. }
            | Self::InvalidAccount { .. }
            | Self::InvalidCostCenter(_)
            | Self::DuplicateCode(_)
            | Self::InvalidCode(_)
            | Self::EmptyName
            | Self::InvalidAccountType(_)
            | Self::VoidReasonRequired
            | Self::InvalidDateRange { .. }
            | Self::AccountInUse(_)
            | Self::SystemAccountProtected(_)
            | Self::InvalidFiscalYearStart { .. } => ErrorKind::Validation,

            Self::AccountNotFound(_) | Self::EntryNotFound(_) => ErrorKind::NotFound,

            Self::InvalidStateTransition { .. }
            | Self::AlreadyVoided(_)
            | Self::EntryImmutable { .. } => ErrorKind::InvalidStateTransition,

            Self::NumberAssignmentConflict { .. } => ErrorKind::Concurrency,

            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLines { .. } => "INSUFFICIENT_LINES",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::MalformedLine { .. } => "MALFORMED_LINE",
            Self::InvalidAccount { .. } => "INVALID_ACCOUNT",
            Self::InvalidCostCenter(_) => "INVALID_COST_CENTER",
            Self::DuplicateCode(_) => "DUPLICATE_CODE",
            Self::InvalidCode(_) => "INVALID_CODE",
            Self::EmptyName => "EMPTY_NAME",
            Self::InvalidAccountType(_) => "INVALID_ACCOUNT_TYPE",
            Self::VoidReasonRequired => "VOID_REASON_REQUIRED",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::AccountInUse(_) => "ACCOUNT_IN_USE",
            Self::SystemAccountProtected(_) => "SYSTEM_ACCOUNT_PROTECTED",
            Self::InvalidFiscalYearStart { .. } => "INVALID_FISCAL_YEAR_START",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::AlreadyVoided(_) => "ALREADY_VOIDED",
            Self::EntryImmutable { .. } => "ENTRY_IMMUTABLE",
            Self::NumberAssignmentConflict { .. } => "NUMBER_ASSIGNMENT_CONFLICT",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Returns true if the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Concurrency)
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::InvalidStateTransition => Self::InvalidStateTransition(message),
            ErrorKind::Concurrency => Self::Concurrency(message),
            ErrorKind::Persistence => Self::Persistence(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LedgerError::InsufficientLines { count: 1 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::EntryNotFound(JournalEntryId::new()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::AlreadyVoided(JournalEntryId::new()).kind(),
            ErrorKind::InvalidStateTransition
        );
        assert_eq!(
            LedgerError::NumberAssignmentConflict {
                entry_id: JournalEntryId::new()
            }
            .kind(),
            ErrorKind::Concurrency
        );
        assert_eq!(
            LedgerError::Persistence("down".into()).kind(),
            ErrorKind::Persistence
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(
            LedgerError::NumberAssignmentConflict {
                entry_id: JournalEntryId::new()
            }
            .is_retryable()
        );
        assert!(!LedgerError::VoidReasonRequired.is_retryable());
        assert!(!LedgerError::Persistence("down".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::UnbalancedEntry {
            debit: Decimal::new(10000, 2),
            credit: Decimal::new(5000, 2),
            base_debit: Decimal::new(10000, 2),
            base_credit: Decimal::new(5000, 2),
        };
        assert_eq!(
            err.to_string(),
            "Journal entry is not balanced. Debit: 100.00, Credit: 50.00 \
             (base debit: 100.00, base credit: 50.00)"
        );

        let err = LedgerError::MalformedLine {
            line: 2,
            reason: "amounts must not be negative",
        };
        assert_eq!(
            err.to_string(),
            "Line 2 is malformed: amounts must not be negative"
        );
    }

    #[test]
    fn test_converts_into_app_error() {
        let app: AppError = LedgerError::VoidReasonRequired.into();
        assert_eq!(app.status_code(), 400);

        let app: AppError = LedgerError::AlreadyVoided(JournalEntryId::new()).into();
        assert_eq!(app.error_code(), "INVALID_STATE_TRANSITION");

        let app: AppError = LedgerError::from(StoreError::Backend("timeout".into())).into();
        assert_eq!(app.error_code(), "PERSISTENCE_ERROR");
        assert!(app.to_string().contains("timeout"));
    }
}
