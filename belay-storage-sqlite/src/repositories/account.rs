//! SQLite implementation of the account repository.

use async_trait::async_trait;
use belay_core::{
    Account, AccountId, Error, LockoutState, NewAccount,
    error::{StorageError, ValidationError},
    lockout::FailureUpdate,
    repositories::AccountRepository,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const ACCOUNT_COLUMNS: &str = "id, login_name, password_hash, role, failed_login_attempts, \
     last_failed_login, locked_until, last_login_at, created_at, updated_at";

/// A failure starts a new count when the previous one is older than the reset
/// window. An elapsed lock does not reset the count. Binds: reset_before.
const STARTS_FRESH: &str = "(last_failed_login IS NULL OR last_failed_login < ?)";

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteAccount {
    id: i64,
    login_name: String,
    password_hash: String,
    role: String,
    failed_login_attempts: i64,
    last_failed_login: Option<i64>,
    locked_until: Option<i64>,
    last_login_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn timestamp(ts: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| {
        tracing::error!(timestamp = ts, "Timestamp out of range");
        StorageError::Database("Invalid timestamp".to_string()).into()
    })
}

fn optional_timestamp(ts: Option<i64>) -> Result<Option<DateTime<Utc>>, Error> {
    ts.map(timestamp).transpose()
}

impl TryFrom<SqliteAccount> for Account {
    type Error = Error;

    fn try_from(row: SqliteAccount) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|e: ValidationError| {
            tracing::error!(error = %e, account_id = row.id, "Unknown role in accounts table");
            StorageError::Database("Invalid role".to_string())
        })?;

        Ok(Account {
            id: AccountId::new(row.id),
            login_name: row.login_name,
            password_hash: row.password_hash,
            role,
            lockout: LockoutState {
                failed_login_attempts: u32::try_from(row.failed_login_attempts).unwrap_or(u32::MAX),
                last_failed_login: optional_timestamp(row.last_failed_login)?,
                locked_until: optional_timestamp(row.locked_until)?,
            },
            last_login_at: optional_timestamp(row.last_login_at)?,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteAccount>(&format!(
            r#"
            INSERT INTO accounts (login_name, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&account.login_name)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Validation(ValidationError::LoginNameTaken)
            }
            e => {
                tracing::error!(error = %e, "Failed to create account");
                StorageError::Database("Failed to create account".to_string()).into()
            }
        })?;

        row.try_into()
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, account_id = %id, "Failed to find account by id");
            StorageError::Database("Failed to find account".to_string())
        })?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_login_name(&self, login_name: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE login_name = ?"
        ))
        .bind(login_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to find account by login name");
            StorageError::Database("Failed to find account".to_string())
        })?;

        row.map(Account::try_from).transpose()
    }

    async fn set_password_hash(&self, id: AccountId, hash: &str) -> Result<(), Error> {
        let result = sqlx::query("UPDATE accounts SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now().timestamp())
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, account_id = %id, "Failed to set password hash");
                StorageError::Database("Failed to set password hash".to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: AccountId,
        update: FailureUpdate,
    ) -> Result<Account, Error> {
        let now = update.now.timestamp();
        let reset_before = update.reset_before.timestamp();
        let lock_until = update.lock_until.map(|until| until.timestamp());

        // One statement, so concurrent failures serialize on the row. SET
        // expressions all see the old row, hence the repeated count.
        let row = sqlx::query_as::<_, SqliteAccount>(&format!(
            r#"
            UPDATE accounts SET
                failed_login_attempts =
                    CASE WHEN {STARTS_FRESH} THEN 1 ELSE failed_login_attempts + 1 END,
                locked_until = CASE
                    WHEN ? IS NOT NULL
                        AND (CASE WHEN {STARTS_FRESH} THEN 1 ELSE failed_login_attempts + 1 END) >= ?
                    THEN ?
                    ELSE NULL
                END,
                last_failed_login = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(reset_before)
        .bind(lock_until)
        .bind(reset_before)
        .bind(i64::from(update.max_failed_attempts))
        .bind(lock_until)
        .bind(now)
        .bind(now)
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, account_id = %id, "Failed to record failed login");
            StorageError::Database("Failed to record failed login".to_string())
        })?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StorageError::NotFound.into()),
        }
    }

    async fn record_successful_login(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, last_failed_login = NULL, locked_until = NULL,
                last_login_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now.timestamp())
        .bind(now.timestamp())
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, account_id = %id, "Failed to record successful login");
            StorageError::Database("Failed to record successful login".to_string())
        })?;

        Ok(())
    }

    async fn reset_lockout(&self, id: AccountId) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, last_failed_login = NULL, locked_until = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, account_id = %id, "Failed to reset lockout");
            StorageError::Database("Failed to reset lockout".to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }
        Ok(())
    }
}
