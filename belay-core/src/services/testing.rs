//! In-memory repositories for service tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    Error,
    account::{Account, AccountId, LockoutState, NewAccount, Role},
    audit::{AuditEntry, NewAuditEntry},
    error::{StorageError, ValidationError},
    lockout::FailureUpdate,
    password::hash_password,
    repositories::{AccountRepository, AuditRepository},
};

#[derive(Default)]
pub(crate) struct MockAccountRepository {
    accounts: Mutex<HashMap<AccountId, Account>>,
    next_id: Mutex<i64>,
    unavailable: bool,
}

impl MockAccountRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A repository whose every call fails like a lost database connection.
    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) async fn insert(&self, login_name: &str, password: &str, role: Role) -> Account {
        let password_hash = hash_password(password).await.unwrap();
        self.create(NewAccount {
            login_name: login_name.to_string(),
            password_hash,
            role,
        })
        .await
        .unwrap()
    }

    pub(crate) async fn set_lockout(&self, id: AccountId, lockout: LockoutState) {
        let mut accounts = self.accounts.lock().await;
        accounts.get_mut(&id).unwrap().lockout = lockout;
    }

    pub(crate) async fn get(&self, id: AccountId) -> Account {
        self.accounts.lock().await.get(&id).unwrap().clone()
    }

    pub(crate) async fn remove(&self, id: AccountId) {
        self.accounts.lock().await.remove(&id);
    }

    fn check_available(&self) -> Result<(), Error> {
        if self.unavailable {
            return Err(StorageError::Connection("connection refused".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MockAccountRepository {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        self.check_available()?;
        let mut accounts = self.accounts.lock().await;
        if accounts
            .values()
            .any(|a| a.login_name == account.login_name)
        {
            return Err(ValidationError::LoginNameTaken.into());
        }

        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let now = Utc::now();
        let created = Account {
            id: AccountId::new(*next_id),
            login_name: account.login_name,
            password_hash: account.password_hash,
            role: account.role,
            lockout: LockoutState::default(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, Error> {
        self.check_available()?;
        Ok(self.accounts.lock().await.get(&id).cloned())
    }

    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Account>, Error> {
        self.check_available()?;
        Ok(self
            .accounts
            .lock()
            .await
            .values()
            .find(|a| a.login_name == login_name)
            .cloned())
    }

    async fn set_password_hash(&self, id: AccountId, hash: &str) -> Result<(), Error> {
        self.check_available()?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StorageError::NotFound)?;
        account.password_hash = hash.to_string();
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: AccountId,
        update: FailureUpdate,
    ) -> Result<Account, Error> {
        self.check_available()?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StorageError::NotFound)?;
        account.lockout = update.apply(&account.lockout);
        account.updated_at = update.now;
        Ok(account.clone())
    }

    async fn record_successful_login(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.check_available()?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StorageError::NotFound)?;
        account.lockout = LockoutState::default();
        account.last_login_at = Some(now);
        account.updated_at = now;
        Ok(())
    }

    async fn reset_lockout(&self, id: AccountId) -> Result<(), Error> {
        self.check_available()?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StorageError::NotFound)?;
        account.lockout = LockoutState::default();
        account.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockAuditRepository {
    entries: Mutex<Vec<AuditEntry>>,
    failing: bool,
}

impl MockAuditRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A repository that rejects every write.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditRepository for MockAuditRepository {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, Error> {
        if self.failing {
            return Err(StorageError::Database("disk I/O error".to_string()).into());
        }
        let mut entries = self.entries.lock().await;
        let stored = AuditEntry {
            id: entries.len() as i64 + 1,
            action: entry.action,
            performer_id: entry.performer_id,
            performer_type: entry.performer_type,
            detail: entry.detail,
            source_ip: entry.source_ip,
            status: entry.status,
            affected_account_id: entry.affected_account_id,
            created_at: entry.created_at,
        };
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_account(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, Error> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .filter(|e| e.affected_account_id == Some(account_id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>, Error> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
