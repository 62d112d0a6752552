//! Currency codes and base-currency conversion.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` for arbitrary precision.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places kept when converting into the base currency.
pub const BASE_AMOUNT_SCALE: u32 = 4;

/// Exclusive upper bound on any stored amount: `10^15`.
///
/// Amount columns are `NUMERIC(19, 4)`, which leaves 15 integer digits.
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// ISO 4217 currency code (three ASCII letters, stored upper-case).
///
/// The ledger does not keep a closed list of currencies: tenants may book
/// in any code, and rate sourcing lives outside the core.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

/// Error returned for malformed currency codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid currency code: '{0}'")]
pub struct CurrencyCodeError(pub String);

impl CurrencyCode {
    /// Parses a currency code, accepting any letter case.
    pub fn parse(code: &str) -> Result<Self, CurrencyCodeError> {
        let trimmed = code.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(CurrencyCodeError(code.to_string()))
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts an amount using the given exchange rate.
///
/// Uses banker's rounding (round half to even) at [`BASE_AMOUNT_SCALE`] places
/// to minimize cumulative errors.
#[must_use]
pub fn convert_amount(amount: Decimal, rate: Decimal) -> Decimal {
    (amount * rate).round_dp_with_strategy(BASE_AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
}
