//! SQLite storage backend for belay
//!
//! Provides [`SqliteRepositoryProvider`], which implements the account and
//! audit repositories of `belay-core` on top of an `sqlx` SQLite pool, along
//! with the schema migrations they need.
//!
//! # Example
//!
//! ```rust,no_run
//! use belay_core::RepositoryProvider;
//! use belay_storage_sqlite::SqliteRepositoryProvider;
//! use sqlx::SqlitePool;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = SqlitePool::connect("sqlite://belay.db?mode=rwc").await?;
//! let provider = SqliteRepositoryProvider::new(pool);
//! provider.migrate().await?;
//! # Ok(())
//! # }
//! ```
pub mod migrations;
pub mod repositories;

pub use migrations::SqliteMigrationManager;
pub use repositories::{SqliteAccountRepository, SqliteAuditRepository, SqliteRepositoryProvider};
