use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, NewAccount},
    audit::{AuditEntry, NewAuditEntry},
    lockout::FailureUpdate,
    repositories::{AccountRepository, AuditRepository, RepositoryProvider},
};

/// Adapter that wraps a RepositoryProvider and implements [`AccountRepository`]
pub struct AccountRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AccountRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AccountRepository for AccountRepositoryAdapter<R> {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        self.provider.account().create(account).await
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, Error> {
        self.provider.account().find_by_id(id).await
    }

    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Account>, Error> {
        self.provider.account().find_by_login_name(login_name).await
    }

    async fn set_password_hash(&self, id: AccountId, hash: &str) -> Result<(), Error> {
        self.provider.account().set_password_hash(id, hash).await
    }

    async fn record_failed_login(
        &self,
        id: AccountId,
        update: FailureUpdate,
    ) -> Result<Account, Error> {
        self.provider.account().record_failed_login(id, update).await
    }

    async fn record_successful_login(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.provider
            .account()
            .record_successful_login(id, now)
            .await
    }

    async fn reset_lockout(&self, id: AccountId) -> Result<(), Error> {
        self.provider.account().reset_lockout(id).await
    }
}

/// Adapter that wraps a RepositoryProvider and implements [`AuditRepository`]
pub struct AuditRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AuditRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AuditRepository for AuditRepositoryAdapter<R> {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, Error> {
        self.provider.audit().append(entry).await
    }

    async fn find_by_account(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, Error> {
        self.provider.audit().find_by_account(account_id, limit).await
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>, Error> {
        self.provider.audit().recent(limit).await
    }
}
