//! Repository implementations for SQLite storage

pub mod account;
pub mod audit;

pub use account::SqliteAccountRepository;
pub use audit::SqliteAuditRepository;

use async_trait::async_trait;
use belay_core::{
    Error,
    error::StorageError,
    repositories::{AccountRepositoryProvider, AuditRepositoryProvider, RepositoryProvider},
};
use belay_migration::MigrationManager;
use sqlx::SqlitePool;

use crate::migrations::{SqliteMigrationManager, migrations};

/// Repository provider implementation for SQLite
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    account: SqliteAccountRepository,
    audit: SqliteAuditRepository,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            account: SqliteAccountRepository::new(pool.clone()),
            audit: SqliteAuditRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl AccountRepositoryProvider for SqliteRepositoryProvider {
    type AccountRepo = SqliteAccountRepository;

    fn account(&self) -> &Self::AccountRepo {
        &self.account
    }
}

impl AuditRepositoryProvider for SqliteRepositoryProvider {
    type AuditRepo = SqliteAuditRepository;

    fn audit(&self) -> &Self::AuditRepo {
        &self.audit
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?;
        Ok(())
    }
}
