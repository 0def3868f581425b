//! # Belay
//!
//! Belay is the authentication and account-lockout subsystem of the
//! association's membership API. It checks login attempts against a lockout
//! policy, verifies credentials, issues and refreshes signed tokens, and
//! writes an audit trail of every security-relevant event.
//!
//! HTTP routing is not part of this crate. Handlers call into [`Belay`] and map
//! the returned [`Error`] kind to a status code; [`Error::client_message`]
//! gives the text that is safe to send back.
//!
//! ## Storage Support
//!
//! - SQLite (feature `sqlite`, enabled by default)
//!
//! Other backends implement [`RepositoryProvider`] from `belay-core`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use belay::{BelayBuilder, LoginRequest, TokenConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let belay = BelayBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_token_config(TokenConfig::new(std::env::var("BELAY_ACCESS_TOKEN_SECRET")?))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let response = belay
//!         .login(LoginRequest::new("Walter Bonatti", "correct horse 1").with_source_ip("203.0.113.9"))
//!         .await?;
//!     println!("{}", response.tokens.access_token);
//!     Ok(())
//! }
//! ```
pub mod builder;

use std::sync::Arc;

use belay_core::{
    repositories::{AccountRepositoryAdapter, AuditRepositoryAdapter},
    services::{AccountService, AuditLogger, AuthService},
};

pub use builder::{BelayBuilder, BelayBuilderError, NoStorage, WithStorage};

/// Re-export core types from belay_core
pub use belay_core::{
    AccountId, AccountSummary, AuditAction, AuditEntry, AuditStatus, AuthConfig, Error,
    LockoutConfig, LockoutDecision, LockoutPolicy, LoginRequest, LoginResponse, PerformerType,
    RefreshResponse, Registration, RepositoryProvider, Role, SecretKey, TokenClaims, TokenConfig,
    TokenIssuer, TokenKind, TokenPair,
    error::{AuthError, ConfigError, StorageError, TokenError, ValidationError},
};

/// Re-export storage backends
#[cfg(feature = "sqlite")]
pub use belay_storage_sqlite::SqliteRepositoryProvider;

type Accounts<R> = AccountRepositoryAdapter<R>;
type Audit<R> = AuditRepositoryAdapter<R>;

/// The authentication subsystem, wired to one storage backend.
///
/// Cheap to share: wrap it in an `Arc` and hand it to every request handler.
pub struct Belay<R: RepositoryProvider> {
    repositories: Arc<R>,
    auth: AuthService<Accounts<R>, Audit<R>>,
    accounts: AccountService<Accounts<R>, Audit<R>>,
    audit: AuditLogger<Audit<R>>,
}

impl<R: RepositoryProvider> Belay<R> {
    /// Wire the services to `repositories`.
    ///
    /// Fails with a configuration error when no access token secret is set or
    /// a lockout threshold is out of range.
    pub fn new(repositories: Arc<R>, config: AuthConfig) -> Result<Self, Error> {
        config.validate()?;
        let tokens = Arc::new(TokenIssuer::new(config.tokens.clone())?);

        let account_repo = Arc::new(AccountRepositoryAdapter::new(repositories.clone()));
        let audit = AuditLogger::new(Arc::new(AuditRepositoryAdapter::new(repositories.clone())));

        tracing::debug!(
            max_failed_attempts = config.lockout.max_failed_attempts,
            lockout_enabled = config.lockout.enabled,
            "Authentication services configured"
        );

        Ok(Self {
            auth: AuthService::new(account_repo.clone(), audit.clone(), tokens, &config),
            accounts: AccountService::new(account_repo, audit.clone()),
            audit,
            repositories,
        })
    }

    /// Run migrations for the storage backend
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    pub fn lockout_policy(&self) -> &LockoutPolicy {
        self.auth.policy()
    }

    // Authentication

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, Error> {
        self.auth.login(request).await
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        source_ip: Option<&str>,
    ) -> Result<RefreshResponse, Error> {
        self.auth.refresh(refresh_token, source_ip).await
    }

    /// Always acknowledges; see [`AuthService::logout`].
    pub async fn logout(&self, access_token: &str, source_ip: Option<&str>) {
        self.auth.logout(access_token, source_ip).await
    }

    pub fn authenticate(&self, access_token: &str) -> Result<TokenClaims, Error> {
        self.auth.authenticate(access_token)
    }

    // Accounts

    pub async fn register(&self, registration: Registration) -> Result<AccountSummary, Error> {
        self.accounts.register(registration).await
    }

    pub async fn change_password(
        &self,
        account_id: AccountId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        self.accounts
            .change_password(account_id, current_password, new_password)
            .await
    }

    pub async fn unlock(&self, performer: AccountId, account_id: AccountId) -> Result<(), Error> {
        self.accounts.unlock(performer, account_id).await
    }

    pub async fn unlock_by_system(&self, account_id: AccountId) -> Result<(), Error> {
        self.accounts.unlock_by_system(account_id).await
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Option<AccountSummary>, Error> {
        self.accounts.get(account_id).await
    }

    // Audit trail

    pub async fn audit_entries_for(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, Error> {
        self.audit.find_by_account(account_id, limit).await
    }

    pub async fn recent_audit_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, Error> {
        self.audit.recent(limit).await
    }
}
