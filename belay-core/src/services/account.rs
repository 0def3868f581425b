use std::sync::Arc;

use crate::{
    Error,
    account::{AccountId, AccountSummary, NewAccount, Role},
    audit::{AuditAction, AuditStatus, NewAuditEntry},
    error::{AuthError, StorageError, ValidationError},
    password::{hash_password, verify_password},
    repositories::{AccountRepository, AuditRepository},
    services::AuditLogger,
    validation::{validate_login_name, validate_password},
};

/// A registration request with a plaintext password.
#[derive(Debug, Clone)]
pub struct Registration {
    pub login_name: String,
    pub password: String,
    pub role: Role,
}

impl Registration {
    pub fn new(login_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            password: password.into(),
            role: Role::Member,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Registration, password changes and administrative unlocks.
pub struct AccountService<A: AccountRepository, L: AuditRepository> {
    accounts: Arc<A>,
    audit: AuditLogger<L>,
}

impl<A: AccountRepository, L: AuditRepository> AccountService<A, L> {
    pub fn new(accounts: Arc<A>, audit: AuditLogger<L>) -> Self {
        Self { accounts, audit }
    }

    /// Create an account. The password is hashed with the same algorithm
    /// login verifies against.
    pub async fn register(&self, registration: Registration) -> Result<AccountSummary, Error> {
        validate_login_name(&registration.login_name)?;
        validate_password(&registration.password)?;

        if self
            .accounts
            .find_by_login_name(&registration.login_name)
            .await?
            .is_some()
        {
            return Err(ValidationError::LoginNameTaken.into());
        }

        let password_hash = hash_password(&registration.password).await?;
        let new_account = NewAccount::builder()
            .login_name(registration.login_name)
            .password_hash(password_hash)
            .role(registration.role)
            .build()?;
        let account = self.accounts.create(new_account).await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    AuditAction::AccountCreated,
                    AuditStatus::Success,
                    format!("Account created with role {}", account.role),
                )
                .affecting(account.id),
            )
            .await;

        Ok(account.summary())
    }

    /// Replace the password after checking the current one.
    ///
    /// A wrong current password is `InvalidCredentials` and does not count
    /// toward lockout.
    pub async fn change_password(
        &self,
        account_id: AccountId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        validate_password(new_password)?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(current_password, &account.password_hash).await? {
            self.audit
                .record(
                    NewAuditEntry::new(
                        AuditAction::PasswordChanged,
                        AuditStatus::Failed,
                        "Password change rejected: wrong current password",
                    )
                    .performed_by(account_id)
                    .affecting(account_id),
                )
                .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        let hash = hash_password(new_password).await?;
        self.accounts.set_password_hash(account_id, &hash).await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    AuditAction::PasswordChanged,
                    AuditStatus::Success,
                    "Password changed",
                )
                .performed_by(account_id)
                .affecting(account_id),
            )
            .await;

        Ok(())
    }

    /// Clear an account's lockout on behalf of an administrator.
    pub async fn unlock(&self, performer: AccountId, account_id: AccountId) -> Result<(), Error> {
        let is_admin = self
            .accounts
            .find_by_id(performer)
            .await?
            .is_some_and(|p| p.role.is_administrator());

        if !is_admin {
            self.audit
                .record(
                    NewAuditEntry::new(
                        AuditAction::AccountUnlocked,
                        AuditStatus::Blocked,
                        "Unlock rejected: performer is not an administrator",
                    )
                    .performed_by(performer)
                    .affecting(account_id),
                )
                .await;
            return Err(AuthError::InsufficientPrivileges.into());
        }

        self.reset(
            account_id,
            NewAuditEntry::new(
                AuditAction::AccountUnlocked,
                AuditStatus::Success,
                "Account unlocked by administrator",
            )
            .performed_by(performer),
        )
        .await
    }

    /// Clear an account's lockout from an operator tool.
    pub async fn unlock_by_system(&self, account_id: AccountId) -> Result<(), Error> {
        self.reset(
            account_id,
            NewAuditEntry::new(
                AuditAction::AccountUnlocked,
                AuditStatus::Success,
                "Account unlocked by operator",
            )
            .performed_by_system(),
        )
        .await
    }

    async fn reset(&self, account_id: AccountId, entry: NewAuditEntry) -> Result<(), Error> {
        if self.accounts.find_by_id(account_id).await?.is_none() {
            return Err(StorageError::NotFound.into());
        }
        self.accounts.reset_lockout(account_id).await?;
        self.audit.record(entry.affecting(account_id)).await;
        Ok(())
    }

    pub async fn get(&self, account_id: AccountId) -> Result<Option<AccountSummary>, Error> {
        Ok(self
            .accounts
            .find_by_id(account_id)
            .await?
            .map(|account| account.summary()))
    }
}
