//! Tenant context supplied by the caller to every ledger operation.
//!
//! Authentication and tenant resolution happen outside the ledger. What
//! arrives here is already trusted: the tenant's id, the database schema
//! that holds its ledger, and its base (reporting) currency.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CurrencyCode, TenantId};

/// Maximum length of a PostgreSQL identifier.
const MAX_SCHEMA_NAME_LEN: usize = 63;

/// Errors raised when building a tenant context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantContextError {
    /// Schema name is not a plain lowercase identifier.
    #[error("Invalid schema name: '{0}'")]
    InvalidSchemaName(String),
}

/// Identifies exactly one tenant's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: TenantId,
    schema_name: String,
    base_currency: CurrencyCode,
}

impl TenantContext {
    /// Creates a tenant context.
    ///
    /// The schema name is interpolated into `SET LOCAL search_path`, so only
    /// `[a-z_][a-z0-9_]*` up to 63 characters is accepted.
    pub fn new(
        tenant_id: TenantId,
        schema_name: impl Into<String>,
        base_currency: CurrencyCode,
    ) -> Result<Self, TenantContextError> {
        let schema_name = schema_name.into();
        if !is_valid_schema_name(&schema_name) {
            return Err(TenantContextError::InvalidSchemaName(schema_name));
        }
        Ok(Self {
            tenant_id,
            schema_name,
            base_currency,
        })
    }

    /// The tenant id.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// The schema holding this tenant's ledger tables.
    #[must_use]
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// The tenant's reporting currency.
    #[must_use]
    pub const fn base_currency(&self) -> &CurrencyCode {
        &self.base_currency
    }
}

fn is_valid_schema_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_SCHEMA_NAME_LEN
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn usd() -> CurrencyCode {
        CurrencyCode::parse("USD").unwrap()
    }

    #[rstest]
    #[case("tenant_acme")]
    #[case("_t1")]
    #[case("t")]
    fn test_accepts_identifiers(#[case] name: &str) {
        let ctx = TenantContext::new(TenantId::new(), name, usd()).unwrap();
        assert_eq!(ctx.schema_name(), name);
        assert_eq!(ctx.base_currency().as_str(), "USD");
    }

    #[rstest]
    #[case("")]
    #[case("1tenant")]
    #[case("Tenant")]
    #[case("tenant-acme")]
    #[case("tenant\"; DROP SCHEMA public; --")]
    fn test_rejects_non_identifiers(#[case] name: &str) {
        assert_eq!(
            TenantContext::new(TenantId::new(), name, usd()),
            Err(TenantContextError::InvalidSchemaName(name.to_string()))
        );
    }

    #[test]
    fn test_rejects_overlong_schema_name() {
        let name = "t".repeat(64);
        assert!(TenantContext::new(TenantId::new(), name, usd()).is_err());
    }
}
