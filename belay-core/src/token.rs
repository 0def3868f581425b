//! Access and refresh tokens
//!
//! Tokens are HS256 JWTs and are entirely self-contained: nothing about an
//! issued token is stored, so validity is decided by signature and embedded
//! expiry alone. Access and refresh tokens are signed with separate secrets
//! when both are configured; the refresh secret falls back to the access
//! secret otherwise.
//!
//! | Claim | Description                                   |
//! | ----- | --------------------------------------------- |
//! | `sub` | Account id                                    |
//! | `role`| Role at the time of issuance                  |
//! | `typ` | `access` or `refresh`                         |
//! | `iat` | Issued at (seconds since epoch)               |
//! | `exp` | Expiry (seconds since epoch)                  |
//! | `jti` | Random token id, distinct for every token     |
//! | `iss` | Issuer, when configured                       |

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::{AccountId, Role},
    error::{ConfigError, CryptoError, TokenError},
    id::generate_prefixed_id,
};

/// Minimum recommended HMAC secret length in bytes.
const RECOMMENDED_SECRET_LEN: usize = 32;

/// Signing secret. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED; {}])", self.0.len())
    }
}

impl From<&str> for SecretKey {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for SecretKey {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: Role,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl TokenClaims {
    pub fn account_id(&self) -> Result<AccountId, TokenError> {
        self.sub
            .parse()
            .map_err(|_| TokenError::Invalid("subject is not an account id".to_string()))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Tokens handed to a client after login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

/// Configuration for token signing.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: Option<SecretKey>,
    /// Falls back to `access_secret` when unset.
    pub refresh_secret: Option<SecretKey>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub issuer: Option<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: None,
            refresh_secret: None,
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            issuer: None,
        }
    }
}

impl TokenConfig {
    pub fn new(access_secret: impl Into<SecretKey>) -> Self {
        Self {
            access_secret: Some(access_secret.into()),
            ..Self::default()
        }
    }

    pub fn with_refresh_secret(mut self, refresh_secret: impl Into<SecretKey>) -> Self {
        self.refresh_secret = Some(refresh_secret.into());
        self
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let access = self
            .access_secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret("access token secret"))?;

        if access.as_bytes().len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                "Access token secret is shorter than recommended ({RECOMMENDED_SECRET_LEN} bytes)"
            );
        }
        if self.refresh_secret.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(ConfigError::Invalid(
                "refresh token secret is set but empty".to_string(),
            ));
        }
        if self.access_ttl <= Duration::zero() || self.refresh_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid(
                "token lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &SecretKey) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Mints and verifies signed access and refresh tokens.
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: Option<String>,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer, failing when no access secret is configured.
    pub fn new(config: TokenConfig) -> Result<Self, Error> {
        config.validate()?;

        let access_secret = config
            .access_secret
            .as_ref()
            .ok_or(ConfigError::MissingSecret("access token secret"))?;
        let refresh_secret = config.refresh_secret.as_ref().unwrap_or(access_secret);
        if config.refresh_secret.is_none() {
            tracing::info!("No refresh token secret configured, using the access token secret");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            access: SigningKeys::from_secret(access_secret),
            refresh: SigningKeys::from_secret(refresh_secret),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            issuer: config.issuer,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Issue a token of `kind` as if the current time were `now`.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        account_id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = TokenClaims {
            sub: account_id.to_string(),
            role,
            typ: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: generate_prefixed_id("tok"),
            iss: self.issuer.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| CryptoError::JwtSigning(e.to_string()).into())
    }

    pub fn issue_access_token(&self, account_id: AccountId, role: Role) -> Result<String, Error> {
        self.issue_at(TokenKind::Access, account_id, role, Utc::now())
    }

    pub fn issue_refresh_token(&self, account_id: AccountId, role: Role) -> Result<String, Error> {
        self.issue_at(TokenKind::Refresh, account_id, role, Utc::now())
    }

    pub fn issue_pair(&self, account_id: AccountId, role: Role) -> Result<TokenPair, Error> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue_at(TokenKind::Access, account_id, role, now)?,
            refresh_token: self.issue_at(TokenKind::Refresh, account_id, role, now)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Check signature, expiry and kind of a token.
    ///
    /// Every malformed, tampered, foreign-signed or wrong-kind token is
    /// [`TokenError::Invalid`]; only a correctly signed token past its expiry
    /// is [`TokenError::Expired`].
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        if data.claims.typ != kind {
            return Err(TokenError::Invalid(format!(
                "expected {kind} token, got {}",
                data.claims.typ
            )));
        }

        Ok(data.claims)
    }
}
