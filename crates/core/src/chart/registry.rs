//! Account registry: the tenant's chart of accounts and cost centers.

use std::sync::Arc;

use chrono::Utc;
use tally_shared::TenantContext;
use tally_shared::types::{AccountId, CostCenterId};
use tracing::{info, instrument};

use super::types::{
    Account, CostCenter, NewAccount, default_chart, normalize_code, normalize_name,
};
use crate::ledger::error::LedgerError;
use crate::store::{LedgerRead, LedgerStore, LedgerWrite, StoreError};

/// Manages accounts and cost centers.
pub struct AccountRegistry<S> {
    store: Arc<S>,
}

impl<S> Clone for AccountRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> AccountRegistry<S> {
    /// Creates a registry over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates an active account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::DuplicateCode`] if the code exists for the tenant
    /// - [`LedgerError::InvalidCode`] or [`LedgerError::EmptyName`]
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn create_account(
        &self,
        tenant: &TenantContext,
        input: NewAccount,
    ) -> Result<Account, LedgerError> {
        let mut writer = self.store.writer(tenant).await?;
        let account = insert_account(&mut writer, tenant, input).await?;
        writer.commit().await?;

        info!(
            account_id = %account.id,
            code = %account.code,
            account_type = %account.account_type,
            "Account created"
        );
        Ok(account)
    }

    /// Fetches an account.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`].
    pub async fn get_account(
        &self,
        tenant: &TenantContext,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        self.store
            .reader(tenant)
            .await?
            .get_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Looks an account up by code.
    pub async fn find_account_by_code(
        &self,
        tenant: &TenantContext,
        code: &str,
    ) -> Result<Option<Account>, LedgerError> {
        let reader = self.store.reader(tenant).await?;
        Ok(reader.find_account_by_code(code.trim()).await?)
    }

    /// Lists accounts ordered by code.
    pub async fn list_accounts(
        &self,
        tenant: &TenantContext,
        active_only: bool,
    ) -> Result<Vec<Account>, LedgerError> {
        let reader = self.store.reader(tenant).await?;
        Ok(reader.list_accounts(active_only).await?)
    }

    /// Renames an account. Allowed at any time.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn rename_account(
        &self,
        tenant: &TenantContext,
        id: AccountId,
        name: &str,
    ) -> Result<Account, LedgerError> {
        let name = normalize_name(name)?;
        self.modify(tenant, id, |account| {
            account.name = name;
            Ok(())
        })
        .await
    }

    /// Changes an account's code.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountInUse`] once any journal line references it
    /// - [`LedgerError::DuplicateCode`] if the new code is taken
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn change_account_code(
        &self,
        tenant: &TenantContext,
        id: AccountId,
        code: &str,
    ) -> Result<Account, LedgerError> {
        let code = normalize_code(code)?;
        let mut writer = self.store.writer(tenant).await?;
        let mut account = writer
            .get_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;

        if account.code == code {
            return Ok(account);
        }
        if writer.account_is_referenced(id).await? {
            return Err(LedgerError::AccountInUse(id));
        }
        if writer.find_account_by_code(&code).await?.is_some() {
            return Err(LedgerError::DuplicateCode(code));
        }

        let old_code = std::mem::replace(&mut account.code, code);
        account.updated_at = Utc::now();
        writer
            .update_account(&account)
            .await
            .map_err(|err| duplicate_or(err, &account.code))?;
        writer.commit().await?;

        info!(
            account_id = %id,
            old_code = %old_code,
            code = %account.code,
            "Account code changed"
        );
        Ok(account)
    }

    /// Stops an account from receiving new journal lines. Existing lines and
    /// balances are unaffected.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn deactivate_account(
        &self,
        tenant: &TenantContext,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        let account = self
            .modify(tenant, id, |account| {
                account.is_active = false;
                Ok(())
            })
            .await?;
        info!(account_id = %id, "Account deactivated");
        Ok(account)
    }

    /// Lets an inactive account receive journal lines again.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn reactivate_account(
        &self,
        tenant: &TenantContext,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        let account = self
            .modify(tenant, id, |account| {
                account.is_active = true;
                Ok(())
            })
            .await?;
        info!(account_id = %id, "Account reactivated");
        Ok(account)
    }

    /// Hard-deletes an account that was never used.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::SystemAccountProtected`] for system accounts
    /// - [`LedgerError::AccountInUse`] if any journal line references it;
    ///   deactivate it instead
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn delete_account(
        &self,
        tenant: &TenantContext,
        id: AccountId,
    ) -> Result<(), LedgerError> {
        let mut writer = self.store.writer(tenant).await?;
        let account = writer
            .get_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;

        if account.is_system {
            return Err(LedgerError::SystemAccountProtected(id));
        }
        if writer.account_is_referenced(id).await? {
            return Err(LedgerError::AccountInUse(id));
        }

        writer.delete_account(id).await?;
        writer.commit().await?;

        info!(account_id = %id, code = %account.code, "Account deleted");
        Ok(())
    }

    /// Creates the starter chart, skipping codes the tenant already has.
    /// Returns the accounts created.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn seed_default_chart(
        &self,
        tenant: &TenantContext,
    ) -> Result<Vec<Account>, LedgerError> {
        let mut writer = self.store.writer(tenant).await?;
        let mut created = Vec::new();
        for input in default_chart() {
            if writer.find_account_by_code(&input.code).await?.is_some() {
                continue;
            }
            created.push(insert_account(&mut writer, tenant, input).await?);
        }
        writer.commit().await?;

        info!(created = created.len(), "Default chart of accounts seeded");
        Ok(created)
    }

    /// Creates a cost center.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateCode`] if the code exists for the tenant.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn create_cost_center(
        &self,
        tenant: &TenantContext,
        code: &str,
        name: &str,
    ) -> Result<CostCenter, LedgerError> {
        let code = normalize_code(code)?;
        let name = normalize_name(name)?;

        let mut writer = self.store.writer(tenant).await?;
        if writer.find_cost_center_by_code(&code).await?.is_some() {
            return Err(LedgerError::DuplicateCode(code));
        }

        let cost_center = CostCenter {
            id: CostCenterId::new(),
            tenant_id: tenant.tenant_id(),
            code,
            name,
            created_at: Utc::now(),
        };
        writer
            .insert_cost_center(&cost_center)
            .await
            .map_err(|err| duplicate_or(err, &cost_center.code))?;
        writer.commit().await?;

        info!(cost_center_id = %cost_center.id, code = %cost_center.code, "Cost center created");
        Ok(cost_center)
    }

    /// Lists cost centers ordered by code.
    pub async fn list_cost_centers(
        &self,
        tenant: &TenantContext,
    ) -> Result<Vec<CostCenter>, LedgerError> {
        let reader = self.store.reader(tenant).await?;
        Ok(reader.list_cost_centers().await?)
    }

    async fn modify<F>(
        &self,
        tenant: &TenantContext,
        id: AccountId,
        change: F,
    ) -> Result<Account, LedgerError>
    where
        F: FnOnce(&mut Account) -> Result<(), LedgerError> + Send,
    {
        let mut writer = self.store.writer(tenant).await?;
        let mut account = writer
            .get_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        change(&mut account)?;
        account.updated_at = Utc::now();
        writer.update_account(&account).await?;
        writer.commit().await?;
        Ok(account)
    }
}

async fn insert_account<W: LedgerWrite>(
    writer: &mut W,
    tenant: &TenantContext,
    input: NewAccount,
) -> Result<Account, LedgerError> {
    let code = normalize_code(&input.code)?;
    let name = normalize_name(&input.name)?;

    if writer.find_account_by_code(&code).await?.is_some() {
        return Err(LedgerError::DuplicateCode(code));
    }

    let now = Utc::now();
    let account = Account {
        id: AccountId::new(),
        tenant_id: tenant.tenant_id(),
        code,
        name,
        account_type: input.account_type,
        is_system: input.is_system,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    writer
        .insert_account(&account)
        .await
        .map_err(|err| duplicate_or(err, &account.code))?;
    Ok(account)
}

/// A uniqueness conflict from the store is a duplicate code lost to a
/// concurrent writer.
fn duplicate_or(err: StoreError, code: &str) -> LedgerError {
    match err {
        StoreError::Conflict(_) => LedgerError::DuplicateCode(code.to_string()),
        other => other.into(),
    }
}
