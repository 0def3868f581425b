//! Audit entries
//!
//! An audit entry is an immutable record of one security-relevant event. Entries
//! are written by the services as a side effect and read back only by the
//! reporting side of the application.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{account::AccountId, error::ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    Logout,
    TokenRefresh,
    AccountLocked,
    AccountUnlocked,
    AccountCreated,
    PasswordChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::TokenRefresh => "token_refresh",
            AuditAction::AccountLocked => "account_locked",
            AuditAction::AccountUnlocked => "account_unlocked",
            AuditAction::AccountCreated => "account_created",
            AuditAction::PasswordChanged => "password_changed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failed,
    /// Rejected before credentials were checked, e.g. a locked account.
    Blocked,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failed => "failed",
            AuditStatus::Blocked => "blocked",
        }
    }
}

/// Who performed the audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformerType {
    /// An authenticated account; `performer_id` is set.
    Account,
    /// Nobody could be identified, e.g. a login for an unknown name.
    Anonymous,
    /// The application itself, e.g. an automatic lockout.
    System,
}

impl PerformerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformerType::Account => "account",
            PerformerType::Anonymous => "anonymous",
            PerformerType::System => "system",
        }
    }
}

macro_rules! impl_str_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(ValidationError::InvalidField(format!(
                    "unknown {} `{s}`",
                    stringify!($ty)
                )))
            }
        }
    };
}

impl_str_enum!(AuditAction {
    Login,
    Logout,
    TokenRefresh,
    AccountLocked,
    AccountUnlocked,
    AccountCreated,
    PasswordChanged,
});
impl_str_enum!(AuditStatus {
    Success,
    Failed,
    Blocked
});
impl_str_enum!(PerformerType {
    Account,
    Anonymous,
    System
});

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: AuditAction,
    pub performer_id: Option<AccountId>,
    pub performer_type: PerformerType,
    pub detail: String,
    pub source_ip: Option<String>,
    pub status: AuditStatus,
    pub affected_account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

/// An audit entry about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub performer_id: Option<AccountId>,
    pub performer_type: PerformerType,
    pub detail: String,
    pub source_ip: Option<String>,
    pub status: AuditStatus,
    pub affected_account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    /// An entry with no performer, timestamped now.
    pub fn new(action: AuditAction, status: AuditStatus, detail: impl Into<String>) -> Self {
        Self {
            action,
            performer_id: None,
            performer_type: PerformerType::Anonymous,
            detail: detail.into(),
            source_ip: None,
            status,
            affected_account_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn performed_by(mut self, account_id: AccountId) -> Self {
        self.performer_id = Some(account_id);
        self.performer_type = PerformerType::Account;
        self
    }

    pub fn performed_by_system(mut self) -> Self {
        self.performer_id = None;
        self.performer_type = PerformerType::System;
        self
    }

    pub fn affecting(mut self, account_id: AccountId) -> Self {
        self.affected_account_id = Some(account_id);
        self
    }

    pub fn from_ip(mut self, source_ip: Option<&str>) -> Self {
        self.source_ip = source_ip.map(str::to_string);
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
