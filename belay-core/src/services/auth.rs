//! Login, token refresh and logout.
//!
//! A login attempt moves through `Received -> PolicyChecked ->
//! CredentialVerified -> Success | Failure -> Responded`:
//!
//! 1. The account is looked up by login name. An unknown name is answered
//!    exactly like a wrong password, after the same hashing work.
//! 2. The lockout policy is evaluated on freshly read state. A locked account
//!    is rejected without looking at the password.
//! 3. The password is compared with the stored hash. A mismatch is recorded
//!    atomically in storage and answered after the login delay.
//! 4. A match clears the failure state and returns a token pair with a
//!    minimal account projection.
//!
//! Every outcome is audited before tokens are issued.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;

use crate::{
    Error,
    account::AccountSummary,
    audit::{AuditAction, AuditStatus, NewAuditEntry},
    config::AuthConfig,
    error::{AuthError, TokenError},
    lockout::{LockoutDecision, LockoutPolicy},
    password::{verify_dummy_password, verify_password},
    repositories::{AccountRepository, AuditRepository},
    services::AuditLogger,
    token::{TokenClaims, TokenIssuer, TokenKind, TokenPair},
};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub login_name: String,
    pub password: String,
    pub source_ip: Option<String>,
}

impl LoginRequest {
    pub fn new(login_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            password: password.into(),
            source_ip: None,
        }
    }

    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub account: AccountSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    /// Present when refresh tokens are rotated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

pub struct AuthService<A: AccountRepository, L: AuditRepository> {
    accounts: Arc<A>,
    audit: AuditLogger<L>,
    policy: LockoutPolicy,
    tokens: Arc<TokenIssuer>,
    login_delay: Duration,
    rotate_refresh_tokens: bool,
}

impl<A: AccountRepository, L: AuditRepository> AuthService<A, L> {
    pub fn new(
        accounts: Arc<A>,
        audit: AuditLogger<L>,
        tokens: Arc<TokenIssuer>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            accounts,
            audit,
            policy: LockoutPolicy::new(config.lockout.clone()),
            tokens,
            login_delay: config.login_delay,
            rotate_refresh_tokens: config.rotate_refresh_tokens,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, Error> {
        let source_ip = request.source_ip.as_deref();

        let Some(account) = self
            .accounts
            .find_by_login_name(&request.login_name)
            .await?
        else {
            verify_dummy_password(&request.password).await?;
            self.audit
                .record(
                    NewAuditEntry::new(
                        AuditAction::Login,
                        AuditStatus::Failed,
                        "Login failed: unknown login name",
                    )
                    .from_ip(source_ip),
                )
                .await;
            return Err(self.reject_credentials().await);
        };

        let now = Utc::now();
        let decision = self.policy.evaluate_account(&account, now);
        if let LockoutDecision::Locked { until } = decision {
            self.audit
                .record(
                    NewAuditEntry::new(
                        AuditAction::Login,
                        AuditStatus::Blocked,
                        format!("Login blocked: account locked until {}", until.to_rfc3339()),
                    )
                    .affecting(account.id)
                    .from_ip(source_ip),
                )
                .await;
            return Err(AuthError::AccountLocked {
                retry_after_seconds: decision.retry_after_seconds(now).unwrap_or(0),
            }
            .into());
        }

        if !verify_password(&request.password, &account.password_hash).await? {
            let update = self.policy.failure_update(account.role, now);
            let updated = self.accounts.record_failed_login(account.id, update).await?;
            let failures = updated.lockout.failed_login_attempts;

            self.audit
                .record(
                    NewAuditEntry::new(
                        AuditAction::Login,
                        AuditStatus::Failed,
                        format!("Login failed: wrong password ({failures} recent failures)"),
                    )
                    .affecting(account.id)
                    .from_ip(source_ip),
                )
                .await;

            // The account was not locked when evaluated, so a lock now is new.
            if let Some(until) = updated.lockout.locked_until {
                self.audit
                    .record(
                        NewAuditEntry::new(
                            AuditAction::AccountLocked,
                            AuditStatus::Success,
                            format!(
                                "Account locked after {failures} failed logins until {}",
                                until.to_rfc3339()
                            ),
                        )
                        .performed_by_system()
                        .affecting(account.id)
                        .from_ip(source_ip),
                    )
                    .await;
            }

            return Err(self.reject_credentials().await);
        }

        self.accounts
            .record_successful_login(account.id, now)
            .await?;
        self.audit
            .record(
                NewAuditEntry::new(AuditAction::Login, AuditStatus::Success, "Login succeeded")
                    .performed_by(account.id)
                    .affecting(account.id)
                    .from_ip(source_ip),
            )
            .await;

        let tokens = self.tokens.issue_pair(account.id, account.role)?;

        Ok(LoginResponse {
            tokens,
            account: account.summary(),
        })
    }

    /// Wait out the login delay and produce the shared rejection.
    async fn reject_credentials(&self) -> Error {
        tokio::time::sleep(self.login_delay).await;
        AuthError::InvalidCredentials.into()
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The account is re-read so a removed account cannot refresh and the
    /// new access token carries the current role.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        source_ip: Option<&str>,
    ) -> Result<RefreshResponse, Error> {
        let claims = match self.tokens.verify(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                self.audit
                    .record(
                        NewAuditEntry::new(
                            AuditAction::TokenRefresh,
                            AuditStatus::Failed,
                            format!("Refresh rejected: {e}"),
                        )
                        .from_ip(source_ip),
                    )
                    .await;
                return Err(e.into());
            }
        };

        let account_id = claims.account_id()?;
        let Some(account) = self.accounts.find_by_id(account_id).await? else {
            self.audit
                .record(
                    NewAuditEntry::new(
                        AuditAction::TokenRefresh,
                        AuditStatus::Failed,
                        "Refresh rejected: account no longer exists",
                    )
                    .affecting(account_id)
                    .from_ip(source_ip),
                )
                .await;
            return Err(TokenError::Invalid("account no longer exists".to_string()).into());
        };

        let access_token = self.tokens.issue_access_token(account.id, account.role)?;
        let refresh_token = if self.rotate_refresh_tokens {
            Some(self.tokens.issue_refresh_token(account.id, account.role)?)
        } else {
            None
        };

        self.audit
            .record(
                NewAuditEntry::new(
                    AuditAction::TokenRefresh,
                    AuditStatus::Success,
                    "Access token refreshed",
                )
                .performed_by(account.id)
                .affecting(account.id)
                .from_ip(source_ip),
            )
            .await;

        Ok(RefreshResponse {
            access_token,
            refresh_token,
            expires_in: self.tokens.access_ttl().num_seconds(),
        })
    }

    /// Record a logout.
    ///
    /// Tokens are not revoked; the client discards them. An unusable token is
    /// still acknowledged.
    pub async fn logout(&self, access_token: &str, source_ip: Option<&str>) {
        let entry = match self
            .tokens
            .verify(access_token, TokenKind::Access)
            .and_then(|claims| claims.account_id())
        {
            Ok(account_id) => {
                NewAuditEntry::new(AuditAction::Logout, AuditStatus::Success, "Logged out")
                    .performed_by(account_id)
                    .affecting(account_id)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Logout with unusable access token");
                NewAuditEntry::new(
                    AuditAction::Logout,
                    AuditStatus::Failed,
                    format!("Logout with unusable access token: {e}"),
                )
            }
        };

        self.audit.record(entry.from_ip(source_ip)).await;
    }

    /// Verify an access token presented with a request.
    pub fn authenticate(&self, access_token: &str) -> Result<TokenClaims, Error> {
        Ok(self.tokens.verify(access_token, TokenKind::Access)?)
    }
}
