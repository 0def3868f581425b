//! Repository traits for data access layer
//!
//! Services talk to storage only through these traits. A storage backend
//! implements each `*Repository` trait, the matching `*RepositoryProvider`
//! trait, and finally [`RepositoryProvider`], which adds lifecycle methods.

pub mod account;
pub mod adapter;
pub mod audit;

pub use account::AccountRepository;
pub use adapter::{AccountRepositoryAdapter, AuditRepositoryAdapter};
pub use audit::AuditRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for account repository access.
pub trait AccountRepositoryProvider: Send + Sync + 'static {
    type AccountRepo: AccountRepository;

    fn account(&self) -> &Self::AccountRepo;
}

/// Provider trait for audit repository access.
pub trait AuditRepositoryProvider: Send + Sync + 'static {
    type AuditRepo: AuditRepository;

    fn audit(&self) -> &Self::AuditRepo;
}

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// # Example
///
/// ```rust,ignore
/// use belay_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl AccountRepositoryProvider for MyStorage {
///     type AccountRepo = MyAccountRepository;
///     fn account(&self) -> &Self::AccountRepo { &self.accounts }
/// }
///
/// // ... AuditRepositoryProvider ...
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: AccountRepositoryProvider + AuditRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
