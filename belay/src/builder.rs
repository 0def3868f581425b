//! Builder pattern for constructing Belay instances
//!
//! Storage must be configured before the builder can build; this is checked
//! at compile time through the [`NoStorage`] and [`WithStorage`] states.
//! Token secrets and lockout thresholds are checked when [`BelayBuilder::build`]
//! runs, so a misconfigured process refuses to start.
//!
//! # Example
//!
//! ```rust,no_run
//! use belay::{BelayBuilder, LockoutConfig, TokenConfig};
//! use chrono::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let belay = BelayBuilder::new()
//!         .with_sqlite("sqlite://belay.db?mode=rwc")
//!         .await?
//!         .with_token_config(
//!             TokenConfig::new("access-secret-of-at-least-32-bytes!!")
//!                 .with_refresh_secret("refresh-secret-of-at-least-32-bytes!"),
//!         )
//!         .with_lockout(LockoutConfig::default().with_lockout_duration(Duration::minutes(15)))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     belay.health_check().await?;
//!     Ok(())
//! }
//! ```

use std::{sync::Arc, time::Duration};

use belay_core::{AuthConfig, LockoutConfig, RepositoryProvider, TokenConfig};

use crate::Belay;

/// Errors that can occur when building a Belay instance.
#[derive(Debug, thiserror::Error)]
pub enum BelayBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Missing secret or out-of-range setting
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`Belay`] instances.
///
/// # Defaults
///
/// - Lockout: enabled, 5 failures within 120 minutes lock for 30 minutes,
///   administrators exempt
/// - Tokens: no secret (must be configured), 15 minute access tokens,
///   7 day refresh tokens
/// - Login delay: 500 ms
/// - Refresh token rotation: on
/// - Apply migrations: false
pub struct BelayBuilder<Storage> {
    storage: Storage,
    config: AuthConfig,
    apply_migrations: bool,
}

impl Default for BelayBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl BelayBuilder<NoStorage> {
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: AuthConfig::default(),
            apply_migrations: false,
        }
    }

    /// Use an existing repository provider, for backends outside this crate.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> BelayBuilder<WithStorage<R>> {
        BelayBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl BelayBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// The database file is created when it does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/belay.db")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<BelayBuilder<WithStorage<crate::SqliteRepositoryProvider>>, BelayBuilderError> {
        use std::str::FromStr;

        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| BelayBuilderError::StorageConnection(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to SQLite");
                BelayBuilderError::StorageConnection(e.to_string())
            })?;

        Ok(self.with_sqlite_pool(pool))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> BelayBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

impl<Storage> BelayBuilder<Storage> {
    /// Replace the whole configuration at once.
    pub fn with_config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_token_config(mut self, tokens: TokenConfig) -> Self {
        self.config.tokens = tokens;
        self
    }

    pub fn with_lockout(mut self, lockout: LockoutConfig) -> Self {
        self.config.lockout = lockout;
        self
    }

    /// Delay before answering a failed login. Default: 500 ms
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.config.login_delay = delay;
        self
    }

    /// Whether refresh returns a new refresh token. Default: true
    pub fn with_refresh_token_rotation(mut self, rotate: bool) -> Self {
        self.config.rotate_refresh_tokens = rotate;
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl<R: RepositoryProvider> BelayBuilder<WithStorage<R>> {
    /// Build the Belay instance.
    ///
    /// Configuration is validated before anything touches storage.
    pub async fn build(self) -> Result<Belay<R>, BelayBuilderError> {
        self.config.validate().map_err(|e| {
            tracing::error!(error = %e, "Refusing to start with invalid configuration");
            BelayBuilderError::InvalidConfiguration(e.to_string())
        })?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| BelayBuilderError::Migration(e.to_string()))?;
        }

        Belay::new(self.storage.repositories, self.config)
            .map_err(|e| BelayBuilderError::InvalidConfiguration(e.to_string()))
    }
}
