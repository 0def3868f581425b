//! Accounts and roles
//!
//! An account is the subset of a member record the authentication subsystem
//! cares about:
//!
//! | Field                   | Type               | Description                                          |
//! | ----------------------- | ------------------ | ---------------------------------------------------- |
//! | `id`                    | `AccountId`        | Unique numeric identifier.                           |
//! | `login_name`            | `String`           | Unique login name (username or full name).           |
//! | `password_hash`         | `String`           | Salted argon2 hash in PHC format.                    |
//! | `role`                  | `Role`             | Member, admin or superuser.                          |
//! | `lockout`               | `LockoutState`     | Failure counter, last failure and lock timestamp.    |
//! | `last_login_at`         | `Option<DateTime>` | When the account last logged in successfully.        |
//! | `created_at`            | `DateTime`         | When the account was created.                        |
//! | `updated_at`            | `DateTime`         | When the account was last updated.                   |
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, error::ValidationError};

/// Unique numeric identifier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn new(id: i64) -> Self {
        AccountId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(AccountId)
            .map_err(|_| ValidationError::InvalidField(format!("account id `{s}` is not numeric")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    Admin,
    Superuser,
}

impl Role {
    /// Admins and superusers; these may be exempt from automatic lockout.
    pub fn is_administrator(&self) -> bool {
        matches!(self, Role::Admin | Role::Superuser)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Superuser => "superuser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "superuser" => Ok(Role::Superuser),
            other => Err(ValidationError::InvalidField(format!(
                "unknown role `{other}`"
            ))),
        }
    }
}

/// Failure bookkeeping stored alongside the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    pub failed_login_attempts: u32,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub login_name: String,
    /// Never serialized into responses; see [`AccountSummary`].
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub lockout: LockoutState,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            login_name: self.login_name.clone(),
            role: self.role,
        }
    }
}

/// The only projection of an account that is ever returned to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub login_name: String,
    pub role: Role,
}

/// A new account as handed to storage. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login_name: String,
    pub password_hash: String,
    pub role: Role,
}

impl NewAccount {
    pub fn builder() -> NewAccountBuilder {
        NewAccountBuilder::default()
    }
}

#[derive(Default)]
pub struct NewAccountBuilder {
    login_name: Option<String>,
    password_hash: Option<String>,
    role: Role,
}

impl NewAccountBuilder {
    pub fn login_name(mut self, login_name: impl Into<String>) -> Self {
        self.login_name = Some(login_name.into());
        self
    }

    pub fn password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn build(self) -> Result<NewAccount, Error> {
        Ok(NewAccount {
            login_name: self.login_name.ok_or(ValidationError::MissingField(
                "Login name is required".to_string(),
            ))?,
            password_hash: self.password_hash.ok_or(ValidationError::MissingField(
                "Password hash is required".to_string(),
            ))?,
            role: self.role,
        })
    }
}
