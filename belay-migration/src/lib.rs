//! Versioned schema migrations for belay storage backends
//!
//! A backend lists its migrations as boxed [`Migration`] values and hands them
//! to its [`MigrationManager`], which records every applied version in a
//! tracking table so that running migrations twice is a no-op.
use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

pub const MIGRATION_TABLE_NAME: &str = "_belay_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix seconds.
    pub applied_at: i64,
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        MIGRATION_TABLE_NAME
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations in ascending version order
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Roll back applied migrations in descending version order
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;
}

/// Reject a migration list that reuses a version number.
pub fn check_versions<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    let mut seen = HashSet::new();
    for migration in migrations {
        if !seen.insert(migration.version()) {
            return Err(MigrationError::DuplicateVersion(migration.version()));
        }
    }
    Ok(())
}

/// Migrations not yet recorded as applied, sorted by ascending version.
pub fn pending<'m, DB: Database>(
    migrations: &'m [Box<dyn Migration<DB>>],
    applied: &[MigrationRecord],
) -> Vec<&'m dyn Migration<DB>> {
    let applied: HashSet<i64> = applied.iter().map(|r| r.version).collect();
    let mut pending: Vec<&dyn Migration<DB>> = migrations
        .iter()
        .filter(|m| !applied.contains(&m.version()))
        .map(|m| m.as_ref())
        .collect();
    pending.sort_by_key(|m| m.version());
    pending
}
