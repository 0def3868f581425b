//! Core functionality for belay
//!
//! This crate holds the authentication and account-lockout logic of the
//! membership application: the domain types, the pure [`lockout`] policy, the
//! [`token`] issuer, the repository traits storage backends implement, and the
//! services that tie them together.
//!
//! It is storage agnostic. Applications normally use it through the `belay`
//! crate, which wires a storage backend into [`AuthService`] and
//! [`AccountService`].
//!
//! See [`Account`] for the account record, [`LockoutPolicy`] for the lockout
//! rules and [`TokenIssuer`] for access and refresh tokens.
pub mod account;
pub mod audit;
pub mod config;
pub mod error;
pub mod id;
pub mod lockout;
pub mod password;
pub mod repositories;
pub mod services;
pub mod token;
pub mod validation;

pub use account::{Account, AccountId, AccountSummary, LockoutState, NewAccount, Role};
pub use audit::{AuditAction, AuditEntry, AuditStatus, NewAuditEntry, PerformerType};
pub use config::AuthConfig;
pub use error::Error;
pub use lockout::{FailureUpdate, LockoutConfig, LockoutDecision, LockoutPolicy};
pub use repositories::RepositoryProvider;
pub use services::{
    AccountService, AuditLogger, AuthService, LoginRequest, LoginResponse, RefreshResponse,
    Registration,
};
pub use token::{SecretKey, TokenClaims, TokenConfig, TokenIssuer, TokenKind, TokenPair};
