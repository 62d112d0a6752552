//! Fiscal year boundaries.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tally_shared::config::LedgerConfig;

use crate::ledger::error::LedgerError;

/// Month and day on which every fiscal year starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYearStart {
    month: u32,
    day: u32,
}

impl Default for FiscalYearStart {
    /// Calendar years.
    fn default() -> Self {
        Self { month: 1, day: 1 }
    }
}

impl FiscalYearStart {
    /// Creates a fiscal year start.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidFiscalYearStart`] unless the day exists in
    /// every year, which rules out 29 February.
    pub fn new(month: u32, day: u32) -> Result<Self, LedgerError> {
        // 2023 is not a leap year.
        if NaiveDate::from_ymd_opt(2023, month, day).is_none() {
            return Err(LedgerError::InvalidFiscalYearStart { month, day });
        }
        Ok(Self { month, day })
    }

    /// Reads the configured fiscal year start.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        Self::new(config.fiscal_year_start_month, config.fiscal_year_start_day)
    }

    /// Month the fiscal year starts in.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Day of month the fiscal year starts on.
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// First day of the fiscal year that contains `date`.
    pub fn start_for(&self, date: NaiveDate) -> Result<NaiveDate, LedgerError> {
        let this_year = self.in_year(date.year())?;
        if this_year <= date {
            Ok(this_year)
        } else {
            self.in_year(date.year() - 1)
        }
    }

    fn in_year(&self, year: i32) -> Result<NaiveDate, LedgerError> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).ok_or(
            LedgerError::InvalidFiscalYearStart {
                month: self.month,
                day: self.day,
            },
        )
    }
}
