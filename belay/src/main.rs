use std::{str::FromStr, time::Duration};

use belay::{
    AccountId, AuthConfig, Belay, BelayBuilder, BelayBuilderError, ConfigError, LockoutConfig,
    Registration, RepositoryProvider, Role, SqliteRepositoryProvider, TokenConfig,
};
use clap::{Args, Parser};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::EnvFilter;

/// Operator tool for the Belay authentication subsystem
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(
        long,
        env = "BELAY_DATABASE_URL",
        default_value = "sqlite://belay.db?mode=rwc"
    )]
    database_url: String,

    #[command(flatten)]
    auth: AuthArgs,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AuthArgs {
    /// Secret used to sign access tokens
    #[arg(long, env = "BELAY_ACCESS_TOKEN_SECRET", hide_env_values = true, global = true)]
    access_token_secret: Option<String>,

    /// Secret used to sign refresh tokens, defaults to the access token secret
    #[arg(long, env = "BELAY_REFRESH_TOKEN_SECRET", hide_env_values = true, global = true)]
    refresh_token_secret: Option<String>,

    /// Token issuer claim
    #[arg(long, env = "BELAY_TOKEN_ISSUER", global = true)]
    token_issuer: Option<String>,

    /// Failures within the reset window that lock an account
    #[arg(long, env = "BELAY_MAX_FAILED_ATTEMPTS", default_value_t = 5, global = true)]
    max_failed_attempts: u32,

    /// Lock duration in minutes
    #[arg(long, env = "BELAY_LOCKOUT_MINUTES", default_value_t = 30, global = true)]
    lockout_minutes: i64,

    /// Minutes after which an old failure stops counting
    #[arg(long, env = "BELAY_RESET_WINDOW_MINUTES", default_value_t = 120, global = true)]
    reset_window_minutes: i64,

    /// Lock administrators too
    #[arg(long, env = "BELAY_LOCK_ADMINISTRATORS", global = true)]
    lock_administrators: bool,

    /// Delay before a failed login answers, in milliseconds
    #[arg(long, env = "BELAY_LOGIN_DELAY_MS", default_value_t = 500, global = true)]
    login_delay_ms: u64,
}

impl AuthArgs {
    fn config(&self) -> Result<AuthConfig, ConfigError> {
        let mut tokens = TokenConfig::default();
        tokens.access_secret = self.access_token_secret.as_deref().map(Into::into);
        tokens.refresh_secret = self.refresh_token_secret.as_deref().map(Into::into);
        if let Some(issuer) = &self.token_issuer {
            tokens = tokens.with_issuer(issuer.clone());
        }

        Ok(AuthConfig::new(tokens)
            .with_lockout(
                LockoutConfig::default()
                    .with_max_failed_attempts(self.max_failed_attempts)
                    .with_lockout_duration(minutes("lockout_minutes", self.lockout_minutes)?)
                    .with_reset_window(minutes(
                        "reset_window_minutes",
                        self.reset_window_minutes,
                    )?)
                    .with_exempt_administrators(!self.lock_administrators),
            )
            .with_login_delay(Duration::from_millis(self.login_delay_ms)))
    }
}

fn minutes(name: &str, value: i64) -> Result<chrono::Duration, ConfigError> {
    chrono::Duration::try_minutes(value)
        .ok_or_else(|| ConfigError::Invalid(format!("{name} is out of range: {value}")))
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create an account
    CreateAccount {
        login_name: String,
        /// member, admin or superuser
        #[arg(long, default_value = "member")]
        role: Role,
        #[arg(long, env = "BELAY_NEW_ACCOUNT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear the lockout of an account
    Unlock { account_id: AccountId },
    /// Validate the configuration and print it with secrets redacted
    CheckConfig,
    /// Print recent audit entries
    Audit {
        /// Only entries affecting this account
        #[arg(long)]
        account: Option<AccountId>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            println!("Running migrations...");
            let repositories = SqliteRepositoryProvider::new(connect(&cli.database_url).await?);
            repositories.migrate().await?;
            println!("Migrations applied");
        }
        Commands::CreateAccount {
            login_name,
            role,
            password,
        } => {
            let belay = build(&cli.database_url, &cli.auth).await?;
            let account = belay
                .register(Registration::new(login_name, password).with_role(role))
                .await?;
            println!(
                "Created account {} ({}) with role {}",
                account.id, account.login_name, account.role
            );
        }
        Commands::Unlock { account_id } => {
            let belay = build(&cli.database_url, &cli.auth).await?;
            belay.unlock_by_system(account_id).await?;
            println!("Account {account_id} unlocked");
        }
        Commands::CheckConfig => {
            let config = cli.auth.config()?;
            config.validate()?;
            println!("{config:#?}");
        }
        Commands::Audit { account, limit } => {
            let belay = build(&cli.database_url, &cli.auth).await?;
            let entries = match account {
                Some(account_id) => belay.audit_entries_for(account_id, limit).await?,
                None => belay.recent_audit_entries(limit).await?,
            };
            for entry in entries {
                println!(
                    "{} {:<16} {:<8} performer={}{} affected={} ip={} {}",
                    entry.created_at.to_rfc3339(),
                    entry.action.as_str(),
                    entry.status.as_str(),
                    entry.performer_type,
                    entry
                        .performer_id
                        .map(|id| format!(":{id}"))
                        .unwrap_or_default(),
                    entry
                        .affected_account_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    entry.source_ip.as_deref().unwrap_or("-"),
                    entry.detail,
                );
            }
        }
        Commands::Version => {
            println!("Belay v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn connect(url: &str) -> Result<sqlx::SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    SqlitePoolOptions::new().connect_with(options).await
}

async fn build(
    url: &str,
    auth: &AuthArgs,
) -> Result<Belay<SqliteRepositoryProvider>, BelayBuilderError> {
    let config = auth
        .config()
        .map_err(|e| BelayBuilderError::InvalidConfiguration(e.to_string()))?;

    BelayBuilder::new()
        .with_sqlite(url)
        .await?
        .with_config(config)
        .build()
        .await
}
