use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, NewAccount},
    lockout::FailureUpdate,
};

/// Credential store for accounts.
///
/// Implementations never cache accounts; every call reads or writes the
/// current row.
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// Create a new account. Fails with `ValidationError::LoginNameTaken` when
    /// the login name is already in use.
    async fn create(&self, account: NewAccount) -> Result<Account, Error>;

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, Error>;

    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Account>, Error>;

    async fn set_password_hash(&self, id: AccountId, hash: &str) -> Result<(), Error>;

    /// Record a failed login as one atomic read-modify-write.
    ///
    /// Must produce the same state as [`FailureUpdate::apply`] on the stored
    /// lockout fields, even when several failures for the same account race.
    /// Returns the account as it is after the update.
    async fn record_failed_login(
        &self,
        id: AccountId,
        update: FailureUpdate,
    ) -> Result<Account, Error>;

    /// Clear the failure counter and lock, and stamp `last_login_at`.
    async fn record_successful_login(&self, id: AccountId, now: DateTime<Utc>)
    -> Result<(), Error>;

    /// Clear the failure counter and lock without logging in.
    async fn reset_lockout(&self, id: AccountId) -> Result<(), Error>;
}
